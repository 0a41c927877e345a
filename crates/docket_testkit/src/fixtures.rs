//! Fixture entities, repositories and a ready-made test context.
//!
//! - [`Customer`] maps to a single document with optional fields.
//! - [`Order`] is an aggregate stored as a parent document plus one
//!   document per line in a sub-collection.

use chrono::{DateTime, TimeZone, Utc};
use docket_codec::{CodecError, CodecResult, Timestamp, Value};
use docket_core::{
    CollectionPath, CoreError, CoreResult, Direction, Document, DocumentPath, DocumentWrite,
    EntitySet, FieldWrite, Identifiable, InMemoryDatabase, ManualClock, Query, Repository,
    SequentialIds, TransactionConfig, TransactionCoordinator, UnitOfWork, WriteData,
};
use docket_outbox::{Inbox, MessageBus, Outbox, OutboxWorker, WorkerConfig};
use std::sync::Arc;

/// Fixed instant every fixture clock starts at.
pub fn fixture_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0)
        .single()
        .expect("valid fixture time")
}

fn text(doc: &Document, key: &str) -> CodecResult<String> {
    doc.get(key)
        .and_then(Value::as_text)
        .map(str::to_string)
        .ok_or_else(|| CodecError::invalid_structure(format!("`{key}` must be text")))
}

fn integer(doc: &Document, key: &str) -> CodecResult<i64> {
    doc.get(key)
        .and_then(Value::as_integer)
        .ok_or_else(|| CodecError::invalid_structure(format!("`{key}` must be an integer")))
}

/// A customer stored as `customers/{id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    /// Customer id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional email; `None` removes the stored field.
    pub email: Option<String>,
    /// Loyalty tier.
    pub tier: i64,
    /// Free-form tags.
    pub tags: Vec<String>,
}

impl Customer {
    /// Creates a tier-1 customer without email or tags.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            tier: 1,
            tags: Vec::new(),
        }
    }

    fn to_write_data(&self) -> WriteData {
        WriteData::from([
            ("name".to_string(), FieldWrite::set(self.name.as_str())),
            (
                "email".to_string(),
                self.email
                    .as_deref()
                    .map_or(FieldWrite::Unset, FieldWrite::set),
            ),
            ("tier".to_string(), FieldWrite::set(self.tier)),
            ("tags".to_string(), FieldWrite::set(self.tags.clone())),
        ])
    }

    fn from_document(id: &str, doc: &Document) -> CodecResult<Self> {
        Ok(Self {
            id: id.to_string(),
            name: text(doc, "name")?,
            email: doc.get("email").and_then(Value::as_text).map(str::to_string),
            tier: integer(doc, "tier")?,
            tags: doc
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().filter_map(Value::as_text).map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }
}

impl Identifiable for Customer {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Repository of [`Customer`]s.
pub struct CustomerRepo {
    collection: CollectionPath,
    customers: EntitySet<Customer>,
}

impl Default for CustomerRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomerRepo {
    /// Creates a repository over `customers`.
    pub fn new() -> Self {
        Self {
            collection: customers_collection(),
            customers: EntitySet::new(),
        }
    }

    /// Reads a customer through the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the customer does not exist.
    pub fn get(
        &mut self,
        coordinator: &mut TransactionCoordinator<'_>,
        id: &str,
    ) -> CoreResult<Customer> {
        let snapshot = coordinator.get(&self.collection.doc(id)?)?;
        let customer = Customer::from_document(id, &snapshot.into_data()?)?;
        self.track(customer.clone());
        Ok(customer)
    }

    /// Reads every customer of `tier`, ordered by name.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn find_by_tier(
        &mut self,
        coordinator: &mut TransactionCoordinator<'_>,
        tier: i64,
    ) -> CoreResult<Vec<Customer>> {
        let query = Query::collection(self.collection.clone())
            .where_eq("tier", tier)
            .order_by("name", Direction::Ascending);
        let mut found = Vec::new();
        for snapshot in coordinator.query(&query)? {
            let id = snapshot.path.id().to_string();
            let customer = Customer::from_document(&id, &snapshot.into_data()?)?;
            self.track(customer.clone());
            found.push(customer);
        }
        Ok(found)
    }
}

impl Repository for CustomerRepo {
    type Entity = Customer;

    fn entities(&self) -> &EntitySet<Customer> {
        &self.customers
    }

    fn entities_mut(&mut self) -> &mut EntitySet<Customer> {
        &mut self.customers
    }

    fn to_documents(&self, customer: &Customer) -> CoreResult<Vec<DocumentWrite>> {
        Ok(vec![DocumentWrite::new(
            self.collection.doc(&customer.id)?,
            customer.to_write_data(),
        )])
    }
}

/// Returns the `customers` collection.
pub fn customers_collection() -> CollectionPath {
    CollectionPath::new("customers").expect("static collection path")
}

/// Returns the path of customer `id`.
///
/// # Panics
///
/// Panics if `id` is not a single path segment.
pub fn customer_path(id: &str) -> DocumentPath {
    customers_collection()
        .doc(id)
        .expect("customer id must be a single path segment")
}

/// One line of an [`Order`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    /// Line id, unique within the order.
    pub id: String,
    /// Product code.
    pub sku: String,
    /// Units ordered.
    pub quantity: i64,
}

/// An order aggregate stored as `orders/{id}` plus `orders/{id}/lines/{line}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Order id.
    pub id: String,
    /// Ordering customer.
    pub customer_id: String,
    /// When the order was placed.
    pub placed_at: DateTime<Utc>,
    /// Order lines.
    pub lines: Vec<OrderLine>,
}

impl Identifiable for Order {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Repository of [`Order`] aggregates.
pub struct OrderRepo {
    collection: CollectionPath,
    orders: EntitySet<Order>,
}

impl Default for OrderRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderRepo {
    /// Creates a repository over `orders`.
    pub fn new() -> Self {
        Self {
            collection: CollectionPath::new("orders").expect("static collection path"),
            orders: EntitySet::new(),
        }
    }

    fn lines_of(&self, order_id: &str) -> CoreResult<CollectionPath> {
        self.collection.doc(order_id)?.collection("lines")
    }

    /// Reads an order and all of its lines through the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the order does not exist.
    pub fn get(
        &mut self,
        coordinator: &mut TransactionCoordinator<'_>,
        id: &str,
    ) -> CoreResult<Order> {
        let head = coordinator.get(&self.collection.doc(id)?)?.into_data()?;
        let lines_query = Query::collection(self.lines_of(id)?);
        let mut lines = Vec::new();
        for snapshot in coordinator.query(&lines_query)? {
            let line_id = snapshot.path.id().to_string();
            let data = snapshot.into_data()?;
            lines.push(OrderLine {
                id: line_id,
                sku: text(&data, "sku")?,
                quantity: integer(&data, "quantity")?,
            });
        }

        let placed_at = head
            .get("placedAt")
            .and_then(Value::as_instant)
            .ok_or_else(|| CoreError::from(CodecError::invalid_structure("`placedAt` must be an instant")))?
            .to_utc()?;
        let order = Order {
            id: id.to_string(),
            customer_id: text(&head, "customerId")?,
            placed_at,
            lines,
        };
        self.track(order.clone());
        Ok(order)
    }
}

impl Repository for OrderRepo {
    type Entity = Order;

    fn entities(&self) -> &EntitySet<Order> {
        &self.orders
    }

    fn entities_mut(&mut self) -> &mut EntitySet<Order> {
        &mut self.orders
    }

    fn to_documents(&self, order: &Order) -> CoreResult<Vec<DocumentWrite>> {
        let mut docs = vec![DocumentWrite::new(
            self.collection.doc(&order.id)?,
            WriteData::from([
                (
                    "customerId".to_string(),
                    FieldWrite::set(order.customer_id.as_str()),
                ),
                (
                    "placedAt".to_string(),
                    FieldWrite::set(Timestamp::from_utc(order.placed_at)),
                ),
                (
                    "lineCount".to_string(),
                    FieldWrite::set(i64::try_from(order.lines.len()).unwrap_or(i64::MAX)),
                ),
            ]),
        )];

        let lines = self.lines_of(&order.id)?;
        for line in &order.lines {
            docs.push(DocumentWrite::new(
                lines.doc(&line.id)?,
                WriteData::from([
                    ("sku".to_string(), FieldWrite::set(line.sku.as_str())),
                    ("quantity".to_string(), FieldWrite::set(line.quantity)),
                ]),
            ));
        }
        Ok(docs)
    }
}

/// Database, clock and id generator wired together for a test.
pub struct TestContext {
    /// Shared database.
    pub db: Arc<InMemoryDatabase>,
    /// Clock starting at [`fixture_time`].
    pub clock: Arc<ManualClock>,
    /// Ids `evt-1`, `evt-2`, ...
    pub ids: Arc<SequentialIds>,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Creates a context whose database retries without delay.
    pub fn new() -> Self {
        Self::with_config(TransactionConfig::new(5).with_initial_delay(std::time::Duration::ZERO))
    }

    /// Creates a context with a custom retry configuration.
    pub fn with_config(config: TransactionConfig) -> Self {
        Self {
            db: Arc::new(InMemoryDatabase::with_config(config)),
            clock: Arc::new(ManualClock::new(fixture_time())),
            ids: Arc::new(SequentialIds::new("evt")),
        }
    }

    /// Returns a unit of work over the shared database.
    pub fn uow(&self) -> UnitOfWork<Arc<InMemoryDatabase>> {
        UnitOfWork::new(Arc::clone(&self.db))
    }

    /// Returns an outbox over `outbox` using the context clock and ids.
    pub fn outbox(&self) -> Outbox {
        Outbox::new(outbox_collection())
            .with_ids(self.ids.clone())
            .with_clock(self.clock.clone())
    }

    /// Returns an inbox over `inbox` using the context clock.
    pub fn inbox(&self) -> Inbox {
        Inbox::new(CollectionPath::new("inbox").expect("static collection path"))
            .with_clock(self.clock.clone())
    }

    /// Returns a worker draining `outbox` to `bus`.
    pub fn worker<B: MessageBus>(&self, bus: B, config: WorkerConfig) -> OutboxWorker<Arc<InMemoryDatabase>, B> {
        OutboxWorker::new(Arc::clone(&self.db), bus, config).with_clock(self.clock.clone())
    }

    /// Seeds a customer directly into the database.
    pub fn seed_customer(&self, customer: &Customer) {
        self.db.insert(
            customer_path(&customer.id),
            docket_core::creatable(customer.to_write_data()),
        );
    }
}

/// Returns the `outbox` collection.
pub fn outbox_collection() -> CollectionPath {
    CollectionPath::new("outbox").expect("static collection path")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_stored_form_round_trips() {
        let mut customer = Customer::new("c1", "Ada");
        customer.email = Some("ada@example.com".into());
        customer.tags = vec!["vip".into()];
        let doc = docket_core::creatable(customer.to_write_data());
        assert_eq!(Customer::from_document("c1", &doc).unwrap(), customer);
    }

    #[test]
    fn missing_email_is_unset() {
        let data = Customer::new("c1", "Ada").to_write_data();
        assert_eq!(data["email"], FieldWrite::Unset);
    }

    #[test]
    fn order_projects_to_parent_and_lines() {
        let repo = OrderRepo::new();
        let order = Order {
            id: "o1".into(),
            customer_id: "c1".into(),
            placed_at: fixture_time(),
            lines: vec![
                OrderLine { id: "l1".into(), sku: "A".into(), quantity: 1 },
                OrderLine { id: "l2".into(), sku: "B".into(), quantity: 2 },
            ],
        };
        let docs = repo.to_documents(&order).unwrap();
        let paths: Vec<_> = docs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["orders/o1", "orders/o1/lines/l1", "orders/o1/lines/l2"]);
    }
}
