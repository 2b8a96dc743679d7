//! Test utilities for the ODM comprehensive tests
//!
//! Provides the sample models shared by every suite and a database wrapper
//! bound to a fresh in-memory backend.

#![allow(dead_code)]

use num_bigint::BigInt;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
pub use strata_odm::{
    Database, Document, Error, FilterOp, MemoryEngine, Model, ModelBuilder, OdmConfig, Options,
    Persist, PersistEnum, Record, Result, ScalarCodec, Shared, TypeDescriptor, Value,
};
use uuid::Uuid;

/// Global counter for unique database names
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique database name
pub fn unique_name(prefix: &str) -> String {
    let counter = DB_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}", prefix, counter)
}

// ============================================================================
// TestDb
// ============================================================================

/// Database connected to its own in-memory backend
pub struct TestDb {
    pub db: Arc<Database>,
    pub name: String,
}

impl TestDb {
    /// Open a connected database with default configuration
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Open a connected database after adjusting its configuration
    pub fn with_config(adjust: impl FnOnce(&mut OdmConfig)) -> Self {
        let name = unique_name("odm");
        let mut config = OdmConfig::memory(&name);
        adjust(&mut config);
        let db = Database::open(config).expect("Failed to open database");
        Self { db, name }
    }

    /// Second database sharing this one's backend
    pub fn sibling(&self) -> Arc<Database> {
        Database::open(OdmConfig::memory(&self.name)).expect("Failed to open sibling")
    }

    /// Backend engine, for inspecting stored documents and write counters
    pub fn engine(&self) -> Arc<MemoryEngine> {
        MemoryEngine::lookup(&format!("localhost/{}", self.name)).expect("engine not open")
    }

    /// Store a raw document, bypassing the mapping layer
    pub fn insert_raw(&self, table: &str, key: Document, value: Document) {
        self.db
            .gateway()
            .upsert_one(table, key, value, &Options::new())
            .expect("raw insert failed");
    }
}

// ============================================================================
// Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Member,
    Admin,
}

impl PersistEnum for Role {
    const VARIANTS: &'static [Self] = &[Role::Member, Role::Admin];

    fn variant_name(&self) -> &'static str {
        match self {
            Role::Member => "MEMBER",
            Role::Admin => "ADMIN",
        }
    }
}

impl Persist for Role {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::enumeration::<Self>()
    }
}

/// Cached model with a renamed field, an enum and a collection
#[derive(Debug, Default, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub role: Role,
    pub tags: Vec<String>,
}

impl Model for User {
    fn declare(model: ModelBuilder<Self>) -> ModelBuilder<Self> {
        model
            .table("users")
            .cached(true)
            .primary_key("id", |u| &u.id, |u, v| u.id = v)
            .field("name", |u| &u.name, |u, v| u.name = v)
            .field("age", |u| &u.age, |u, v| u.age = v)
            .named("user_age")
            .field("role", |u| &u.role, |u, v| u.role = v)
            .field("tags", |u| &u.tags, |u, v| u.tags = v)
    }
}

pub fn user(name: &str, age: i32) -> Shared<User> {
    Record::new(User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        age,
        role: Role::Member,
        tags: Vec::new(),
    })
}

/// Uncached model with a map field
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Product {
    pub sku: String,
    pub price: i64,
    pub stock: HashMap<String, i32>,
}

impl Model for Product {
    fn declare(model: ModelBuilder<Self>) -> ModelBuilder<Self> {
        model
            .table("products")
            .primary_key("sku", |p| &p.sku, |p, v| p.sku = v)
            .field("price", |p| &p.price, |p, v| p.price = v)
            .field("stock", |p| &p.stock, |p, v| p.stock = v)
    }
}

pub fn product(sku: &str, price: i64) -> Shared<Product> {
    Record::new(Product {
        sku: sku.to_string(),
        price,
        stock: HashMap::from([("berlin".to_string(), 3), ("lisbon".to_string(), 0)]),
    })
}

/// Cached, auto-fetched model with the less common scalar kinds
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Ledger {
    pub id: i64,
    pub balance: BigInt,
    pub window: Duration,
    pub flags: BTreeSet<String>,
    pub code: char,
    pub ratio: f32,
    pub small: i8,
    pub medium: i16,
    pub active: bool,
}

impl Model for Ledger {
    fn declare(model: ModelBuilder<Self>) -> ModelBuilder<Self> {
        model
            .table("ledgers")
            .cached(true)
            .auto_fetch(true)
            .primary_key("id", |l| &l.id, |l, v| l.id = v)
            .field("balance", |l| &l.balance, |l, v| l.balance = v)
            .field("window", |l| &l.window, |l, v| l.window = v)
            .field("flags", |l| &l.flags, |l, v| l.flags = v)
            .field("code", |l| &l.code, |l, v| l.code = v)
            .field("ratio", |l| &l.ratio, |l, v| l.ratio = v)
            .field("small", |l| &l.small, |l, v| l.small = v)
            .field("medium", |l| &l.medium, |l, v| l.medium = v)
            .field("active", |l| &l.active, |l, v| l.active = v)
    }
}

pub fn ledger(id: i64) -> Ledger {
    Ledger {
        id,
        balance: BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap(),
        window: Duration::new(90, 500),
        flags: BTreeSet::from(["audited".to_string(), "eu".to_string()]),
        code: 'Z',
        ratio: 0.25,
        small: -8,
        medium: 1024,
        active: true,
    }
}

/// Custom field type stored through a registered codec
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Cents(pub i64);

impl Persist for Cents {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::scalar::<Self>()
    }
}

pub struct CentsCodec;

impl ScalarCodec<Cents> for CentsCodec {
    fn encode(&self, value: &Cents) -> Result<Value> {
        Ok(Value::String(format!("{}.{:02}", value.0 / 100, value.0 % 100)))
    }

    fn decode(&self, value: &Value) -> Result<Cents> {
        let text = value
            .as_str()
            .ok_or_else(|| Error::codec::<Cents>("expected a string"))?;
        let (whole, fraction) = text
            .split_once('.')
            .ok_or_else(|| Error::codec::<Cents>("expected <whole>.<cents>"))?;
        let whole: i64 = whole.parse().map_err(|_| Error::codec::<Cents>("bad amount"))?;
        let fraction: i64 = fraction
            .parse()
            .map_err(|_| Error::codec::<Cents>("bad amount"))?;
        Ok(Cents(whole * 100 + fraction))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Invoice {
    pub number: i32,
    pub total: Cents,
}

impl Model for Invoice {
    fn declare(model: ModelBuilder<Self>) -> ModelBuilder<Self> {
        model
            .table("invoices")
            .primary_key("number", |i| &i.number, |i, v| i.number = v)
            .field("total", |i| &i.total, |i, v| i.total = v)
    }
}

// ============================================================================
// Invalid declarations
// ============================================================================

#[derive(Debug, Default)]
pub struct Undeclared {
    pub id: i32,
}

impl Model for Undeclared {}

#[derive(Debug, Default)]
pub struct Keyless {
    pub name: String,
}

impl Model for Keyless {
    fn declare(model: ModelBuilder<Self>) -> ModelBuilder<Self> {
        model
            .table("keyless")
            .field("name", |k| &k.name, |k, v| k.name = v)
    }
}

#[derive(Debug, Default)]
pub struct TwoKeys {
    pub a: i32,
    pub b: i32,
}

impl Model for TwoKeys {
    fn declare(model: ModelBuilder<Self>) -> ModelBuilder<Self> {
        model
            .table("two_keys")
            .primary_key("a", |t| &t.a, |t, v| t.a = v)
            .primary_key("b", |t| &t.b, |t, v| t.b = v)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Names of the users, in order
pub fn names(users: &[Shared<User>]) -> Vec<String> {
    users.iter().map(|u| u.read().name.clone()).collect()
}

/// Stored document of a user, looked up by id
pub fn stored_user(test: &TestDb, user: &Shared<User>) -> Option<Document> {
    let key = Document::new().with("id", user.read().id.to_string());
    test.engine().find("users", &key).into_iter().next()
}
