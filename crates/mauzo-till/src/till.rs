//! # Till
//!
//! The handle a till UI holds for one logged-in operator.
//!
//! ```text
//! Till::open(config, gateway)
//!   ├── Database            (sqlx pool, migrations run)
//!   ├── TillSession         (user, device, write lock)
//!   ├── EventBus            ledger subscriber, then inventory subscriber
//!   ├── CartState           working cart
//!   ├── ShiftStore          start / expense / close / history
//!   └── TransactionRecorder checkout, status, delete
//! ```

use std::sync::Arc;

use mauzo_core::{
    calculate_expected_cash, Cart, CustomerRef, Expense, Money, Shift, Tender, Transaction,
};
use mauzo_db::{Database, DbConfig, DbError};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::TillConfig;
use crate::error::TillResult;
use crate::events::EventBus;
use crate::inventory::InventorySubscriber;
use crate::ledger::AccountsLedgerSubscriber;
use crate::mobile_money::MobileMoneyGateway;
use crate::recorder::{RecordOutcome, TransactionRecorder};
use crate::session::TillSession;
use crate::shift_store::ShiftStore;
use crate::state::CartState;

#[derive(Debug, Clone)]
pub struct Till {
    config: TillConfig,
    db: Database,
    session: Arc<TillSession>,
    events: EventBus,
    cart: CartState,
    shifts: ShiftStore,
    recorder: TransactionRecorder,
}

impl Till {
    /// Opens the configured database and logs the configured operator in.
    pub async fn open(
        config: TillConfig,
        gateway: Arc<dyn MobileMoneyGateway>,
    ) -> TillResult<Self> {
        let db = Database::new(DbConfig::new(config.database_path()?)).await?;
        Self::with_database(config, db, gateway)
    }

    /// Builds a till over an existing database handle.
    pub fn with_database(
        config: TillConfig,
        db: Database,
        gateway: Arc<dyn MobileMoneyGateway>,
    ) -> TillResult<Self> {
        config.validate()?;
        let session = TillSession::open(&config.till.user_id, &config.till.device_id)?;

        let events = EventBus::default();
        events.register(Arc::new(AccountsLedgerSubscriber::new(db.accounts())));
        events.register(Arc::new(InventorySubscriber::new(db.inventory())));

        let shifts = ShiftStore::new(session.clone(), db.clone(), events.clone());
        let recorder = TransactionRecorder::new(
            session.clone(),
            db.clone(),
            events.clone(),
            gateway,
            config.stk_timeout(),
        );

        info!(
            store = %config.store.name,
            user_id = %session.user_id(),
            device_id = %session.device_id(),
            "Till ready"
        );

        Ok(Till {
            config,
            db,
            session,
            events,
            cart: CartState::new(),
            shifts,
            recorder,
        })
    }

    pub fn config(&self) -> &TillConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn session(&self) -> &Arc<TillSession> {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn cart(&self) -> &CartState {
        &self.cart
    }

    pub fn shifts(&self) -> &ShiftStore {
        &self.shifts
    }

    pub fn recorder(&self) -> &TransactionRecorder {
        &self.recorder
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Adds `quantity` units of a product, checked against its stock.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown or inactive product
    /// - `InsufficientStock` when the cart would hold more than is on hand
    pub async fn add_to_cart(&self, product_id: &str, quantity: i64) -> TillResult<Cart> {
        self.session.ensure_open()?;
        let inventory = self.db.inventory();

        let available = inventory.available_quantity(product_id).await?;
        let product = inventory
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))?;

        self.cart
            .update(|cart| cart.add_line(product.cart_line(quantity), available))?;
        self.cart.snapshot()
    }

    // =========================================================================
    // Shift Store
    // =========================================================================

    pub async fn start_shift(&self, opening_balance: Money) -> TillResult<Shift> {
        self.shifts.start_shift(opening_balance).await
    }

    pub async fn close_shift(&self) -> TillResult<Shift> {
        self.shifts.close_shift().await
    }

    pub async fn add_expense(&self, description: &str, amount: Money) -> TillResult<Expense> {
        self.shifts.add_expense(description, amount).await
    }

    pub async fn get_shift_history(&self, limit: u32) -> TillResult<Vec<Shift>> {
        self.shifts.get_shift_history(limit).await
    }

    pub async fn get_shift_transactions(&self, shift_id: &str) -> TillResult<Vec<Transaction>> {
        self.shifts.get_shift_transactions(shift_id).await
    }

    pub fn calculate_expected_cash(&self, shift: &Shift) -> Money {
        calculate_expected_cash(shift)
    }

    // =========================================================================
    // Transaction Recorder
    // =========================================================================

    /// Checks out the working cart.
    pub async fn record_transaction(
        &self,
        tender: Tender,
        customer: Option<CustomerRef>,
        cancel: &CancellationToken,
    ) -> TillResult<RecordOutcome> {
        self.recorder
            .record_transaction(&self.cart, tender, customer, cancel)
            .await
    }

    /// Ends the session. The cart is dropped; the shift stays open for the
    /// next login.
    pub async fn logout(&self) -> TillResult<()> {
        self.session.close().await;
        self.cart.clear()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TillError;
    use crate::events::TillEvent;
    use crate::mobile_money::{
        GatewayError, SimulatedMobileMoneyGateway, StkConfirmation, StkPushRequest,
    };
    use chrono::Utc;
    use mauzo_core::{
        CoreError, PaymentMethod, ShiftTotalKey, SplitAllocator, TenderLeg, TransactionStatus,
    };
    use mauzo_db::Product;
    use std::time::Duration;

    async fn till_with(gateway: Arc<dyn MobileMoneyGateway>) -> Till {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Till::with_database(TillConfig::default(), db, gateway).unwrap()
    }

    async fn till() -> Till {
        till_with(Arc::new(SimulatedMobileMoneyGateway::confirming(
            Duration::from_millis(5),
        )))
        .await
    }

    async fn stock(till: &Till, id: &str, price: Money, quantity: Option<i64>) {
        let now = Utc::now();
        till.database()
            .inventory()
            .insert(&Product {
                id: id.to_string(),
                sku: format!("SKU-{id}"),
                name: format!("Product {id}"),
                price_cents: price.cents(),
                stock_quantity: quantity,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    fn split(legs: &[(PaymentMethod, i64)]) -> Tender {
        Tender::Split(
            legs.iter()
                .map(|(method, major)| TenderLeg::new(*method, Money::from_major(*major)))
                .collect(),
        )
    }

    async fn active(till: &Till) -> Shift {
        till.shifts().get_active_shift().await.unwrap().unwrap()
    }

    fn no_cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_cash_sale_expense_and_close() {
        let till = till().await;
        stock(&till, "unga", Money::from_major(1200), None).await;

        till.start_shift(Money::from_major(5000)).await.unwrap();
        till.add_to_cart("unga", 1).await.unwrap();
        let txn = till
            .record_transaction(
                Tender::full(PaymentMethod::Cash, Money::from_major(1200)),
                None,
                &no_cancel(),
            )
            .await
            .unwrap()
            .committed()
            .unwrap();
        assert!(!txn.is_invoice);
        assert!(txn.receipt_number.starts_with("RCP-"));

        let shift = active(&till).await;
        assert_eq!(shift.payment_totals.cash, Money::from_major(1200));
        assert_eq!(shift.total_sales(), Money::from_major(1200));

        till.add_expense("fuel", Money::from_major(300)).await.unwrap();
        let shift = active(&till).await;
        assert_eq!(shift.payment_totals.cash, Money::from_major(1200));
        assert_eq!(till.calculate_expected_cash(&shift), Money::from_major(5900));

        let closed = till.close_shift().await.unwrap();
        assert_eq!(closed.closing_balance(), Some(Money::from_major(5900)));
        assert!(till.shifts().get_active_shift().await.unwrap().is_none());
        assert_eq!(till.get_shift_history(10).await.unwrap()[0].id, closed.id);
        assert!(till.cart().snapshot().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_split_with_confirmed_stk_leg() {
        let gateway = Arc::new(SimulatedMobileMoneyGateway::confirming(Duration::from_millis(5)));
        let till = till_with(gateway.clone()).await;
        stock(&till, "sukari", Money::from_major(500), None).await;

        till.start_shift(Money::from_major(1000)).await.unwrap();
        till.add_to_cart("sukari", 2).await.unwrap();
        let txn = till
            .record_transaction(
                split(&[(PaymentMethod::Cash, 400), (PaymentMethod::MpesaStk, 600)]),
                None,
                &no_cancel(),
            )
            .await
            .unwrap()
            .committed()
            .unwrap();

        assert!(!txn.is_invoice);
        assert_eq!(txn.payments.len(), 2);
        assert_eq!(txn.payments[1].reference.as_ref().map(String::len), Some(10));
        assert_eq!(gateway.request_count(), 1);

        let shift = active(&till).await;
        assert_eq!(shift.payment_totals.cash, Money::from_major(400));
        assert_eq!(shift.payment_totals.mpesa, Money::from_major(600));
        assert_eq!(shift.total_sales(), Money::from_major(1000));
        assert_eq!(till.get_shift_transactions(&shift.id).await.unwrap().len(), 1);

        let accounts = till.database().accounts();
        assert_eq!(
            accounts.balance(ShiftTotalKey::Cash).await.unwrap(),
            Money::from_major(400)
        );
        assert_eq!(
            accounts.balance(ShiftTotalKey::Mpesa).await.unwrap(),
            Money::from_major(600)
        );
        assert_eq!(
            accounts.postings_for_transaction(&txn.id).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_short_split_rejected_without_side_effects() {
        let till = till().await;
        stock(&till, "sukari", Money::from_major(500), None).await;

        till.start_shift(Money::from_major(1000)).await.unwrap();
        till.add_to_cart("sukari", 2).await.unwrap();
        let err = till
            .record_transaction(
                split(&[(PaymentMethod::Cash, 400), (PaymentMethod::BankTransfer, 550)]),
                None,
                &no_cancel(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TillError::Core(CoreError::SplitAmountMismatch { .. })
        ));
        let shift = active(&till).await;
        assert_eq!(shift.total_sales(), Money::zero());
        assert_eq!(shift.payment_totals.sum(), Money::zero());
        assert!(till.recorder().list_transactions(10).await.unwrap().is_empty());
        assert_eq!(till.cart().snapshot().unwrap().total(), Money::from_major(1000));
    }

    #[tokio::test]
    async fn test_sale_without_shift_changes_nothing() {
        let till = till().await;
        stock(&till, "chumvi", Money::from_major(500), Some(4)).await;

        till.add_to_cart("chumvi", 1).await.unwrap();
        let err = till
            .record_transaction(
                Tender::full(PaymentMethod::Cash, Money::from_major(500)),
                None,
                &no_cancel(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TillError::Core(CoreError::NoActiveShift)));
        assert!(till.recorder().list_transactions(10).await.unwrap().is_empty());
        assert_eq!(
            till.database()
                .accounts()
                .balance(ShiftTotalKey::Cash)
                .await
                .unwrap(),
            Money::zero()
        );
        assert_eq!(
            till.database()
                .inventory()
                .available_quantity("chumvi")
                .await
                .unwrap(),
            Some(4)
        );
        assert_eq!(till.cart().snapshot().unwrap().line_count(), 1);
    }

    #[tokio::test]
    async fn test_credit_sale_needs_customer_then_invoices() {
        let till = till().await;
        stock(&till, "mchele", Money::from_major(2000), None).await;

        till.start_shift(Money::zero()).await.unwrap();
        till.add_to_cart("mchele", 1).await.unwrap();
        let tender = Tender::full(PaymentMethod::Credit, Money::from_major(2000));

        let outcome = till
            .record_transaction(tender.clone(), None, &no_cancel())
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::CustomerRequired);
        assert_eq!(active(&till).await.total_sales(), Money::zero());
        assert_eq!(till.cart().snapshot().unwrap().line_count(), 1);

        let txn = till
            .record_transaction(tender, Some(CustomerRef::new("C1", "Jane")), &no_cancel())
            .await
            .unwrap()
            .committed()
            .unwrap();

        assert!(txn.is_invoice);
        assert_eq!(txn.customer_id.as_deref(), Some("C1"));
        assert_eq!(txn.customer_name.as_deref(), Some("Jane"));
        assert!(txn.receipt_number.starts_with("INV-"));
        assert_eq!(txn.status, TransactionStatus::Pending);
        assert_eq!(txn.paid_amount(), Some(Money::zero()));
        assert_eq!(active(&till).await.payment_totals.credit, Money::from_major(2000));
    }

    #[tokio::test]
    async fn test_expense_after_close_rejected() {
        let till = till().await;
        till.start_shift(Money::from_major(1000)).await.unwrap();
        till.close_shift().await.unwrap();

        let err = till
            .add_expense("fuel", Money::from_major(100))
            .await
            .unwrap_err();
        assert!(matches!(err, TillError::Core(CoreError::NoActiveShift)));
        assert!(till.get_shift_history(10).await.unwrap()[0].expenses.is_empty());
    }

    #[tokio::test]
    async fn test_second_shift_rejected_while_one_is_open() {
        let till = till().await;
        till.start_shift(Money::from_major(1000)).await.unwrap();

        let err = till.start_shift(Money::from_major(2000)).await.unwrap_err();
        assert!(matches!(
            err,
            TillError::Core(CoreError::ShiftAlreadyActive { .. })
        ));
        assert_eq!(active(&till).await.opening_balance(), Money::from_major(1000));
    }

    #[tokio::test]
    async fn test_totals_stay_consistent_across_mixed_sales() {
        let till = till().await;
        stock(&till, "maziwa", Money::from_major(60), None).await;
        till.start_shift(Money::from_major(500)).await.unwrap();

        let tenders = [
            Tender::full(PaymentMethod::Cash, Money::from_major(120)),
            Tender::full(PaymentMethod::MpesaTill, Money::from_major(120)),
            split(&[(PaymentMethod::OtherCustom, 20), (PaymentMethod::Card, 100)]),
            split(&[(PaymentMethod::PochiLaBiashara, 60), (PaymentMethod::MpesaStk, 60)]),
        ];
        for tender in tenders {
            till.add_to_cart("maziwa", 2).await.unwrap();
            till.record_transaction(tender, None, &no_cancel())
                .await
                .unwrap()
                .committed()
                .unwrap();
        }

        let shift = active(&till).await;
        assert!(shift.totals_consistent());
        assert_eq!(shift.total_sales(), Money::from_major(480));
        assert_eq!(shift.payment_totals.cash, Money::from_major(140));
        assert_eq!(shift.payment_totals.card, Money::from_major(100));
        assert_eq!(till.calculate_expected_cash(&shift), Money::from_major(640));

        let numbers: Vec<String> = till
            .get_shift_transactions(&shift.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.receipt_number)
            .collect();
        assert!(numbers[0].ends_with("-0001"));
        assert!(numbers[3].ends_with("-0004"));

        let till_txn = till.recorder().list_transactions(10).await.unwrap();
        let till_leg = till_txn
            .iter()
            .flat_map(|t| &t.payments)
            .find(|p| p.method == PaymentMethod::MpesaTill)
            .unwrap();
        assert_eq!(till_leg.reference.as_ref().map(String::len), Some(10));
    }

    #[tokio::test]
    async fn test_concurrent_sales_are_serialized() {
        let till = till().await;
        till.start_shift(Money::zero()).await.unwrap();

        let carts: Vec<CartState> = (0..2)
            .map(|i| {
                let cart = CartState::new();
                cart.update(|c| {
                    c.add_line(
                        mauzo_core::CartLine::new(format!("p-{i}"), "Mkate", Money::from_major(55), 1),
                        None,
                    )
                })
                .unwrap();
                cart
            })
            .collect();

        let recorder = till.recorder();
        let cash = || Tender::full(PaymentMethod::Cash, Money::from_major(55));
        let cancel = no_cancel();
        let (a, b) = tokio::join!(
            recorder.record_transaction(&carts[0], cash(), None, &cancel),
            recorder.record_transaction(&carts[1], cash(), None, &cancel),
        );
        a.unwrap().committed().unwrap();
        b.unwrap().committed().unwrap();

        let shift = active(&till).await;
        assert_eq!(shift.payment_totals.cash, Money::from_major(110));
        assert!(shift.totals_consistent());
    }

    #[tokio::test]
    async fn test_ledger_failure_does_not_undo_sale() {
        let till = till().await;
        stock(&till, "sabuni", Money::from_major(150), Some(10)).await;
        till.start_shift(Money::zero()).await.unwrap();

        sqlx::query("DROP TABLE account_postings")
            .execute(till.database().pool())
            .await
            .unwrap();
        let mut rx = till.events().observe();

        till.add_to_cart("sabuni", 2).await.unwrap();
        let outcome = till
            .record_transaction(
                Tender::full(PaymentMethod::Cash, Money::from_major(300)),
                None,
                &no_cancel(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.subscriber_failures().len(), 1);
        assert_eq!(outcome.subscriber_failures()[0].subscriber, "accounts-ledger");
        let txn = outcome.committed().unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            TillEvent::LedgerPostingFailed { transaction_id, .. } if transaction_id == txn.id
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            TillEvent::TransactionCommitted(_)
        ));
        assert_eq!(till.recorder().get_transaction(&txn.id).await.unwrap().id, txn.id);
        assert_eq!(active(&till).await.payment_totals.cash, Money::from_major(300));
        assert_eq!(
            till.database()
                .inventory()
                .available_quantity("sabuni")
                .await
                .unwrap(),
            Some(8)
        );
    }

    #[tokio::test]
    async fn test_declined_push_keeps_cart_and_totals() {
        let till = till_with(Arc::new(SimulatedMobileMoneyGateway::declining(
            Duration::from_millis(5),
            "insufficient balance",
        )))
        .await;
        stock(&till, "sukari", Money::from_major(500), None).await;
        till.start_shift(Money::zero()).await.unwrap();
        till.add_to_cart("sukari", 2).await.unwrap();

        let err = till
            .record_transaction(
                split(&[(PaymentMethod::Cash, 400), (PaymentMethod::MpesaStk, 600)]),
                None,
                &no_cancel(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TillError::AsyncPaymentFailed { .. }));
        assert!(err.is_retryable());
        assert_eq!(active(&till).await.total_sales(), Money::zero());
        assert_eq!(till.cart().snapshot().unwrap().total(), Money::from_major(1000));
        assert!(till.recorder().list_transactions(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stk_leg_with_preset_reference_still_needs_confirmation() {
        let gateway = Arc::new(SimulatedMobileMoneyGateway::declining(
            Duration::from_millis(5),
            "request cancelled by user",
        ));
        let till = till_with(gateway.clone()).await;
        stock(&till, "sukari", Money::from_major(500), None).await;
        till.start_shift(Money::zero()).await.unwrap();
        till.add_to_cart("sukari", 1).await.unwrap();

        let tender = Tender::Full(
            TenderLeg::new(PaymentMethod::MpesaStk, Money::from_major(500)).with_reference("QWE123RTY9"),
        );
        let err = till
            .record_transaction(tender, None, &no_cancel())
            .await
            .unwrap_err();

        assert!(matches!(err, TillError::AsyncPaymentFailed { .. }));
        assert_eq!(gateway.request_count(), 1);
        let shift = active(&till).await;
        assert_eq!(shift.payment_totals.mpesa, Money::zero());
        assert_eq!(shift.total_sales(), Money::zero());
        assert!(till.recorder().list_transactions(5).await.unwrap().is_empty());
        assert_eq!(till.cart().snapshot().unwrap().line_count(), 1);
    }

    #[tokio::test]
    async fn test_split_stk_reference_is_replaced_by_receipt_code() {
        let gateway = Arc::new(SimulatedMobileMoneyGateway::confirming(Duration::from_millis(5)));
        let till = till_with(gateway.clone()).await;
        stock(&till, "sukari", Money::from_major(500), None).await;
        till.start_shift(Money::zero()).await.unwrap();
        till.add_to_cart("sukari", 2).await.unwrap();

        let mut split = SplitAllocator::new(Money::from_major(1000));
        split.add_entry(PaymentMethod::Cash, Money::from_major(400)).unwrap();
        split
            .add_entry_with_reference(
                PaymentMethod::MpesaStk,
                Money::from_major(600),
                Some("TYPEDBYHAND".into()),
            )
            .unwrap();

        let txn = till
            .recorder()
            .record_split(till.cart(), split, &no_cancel())
            .await
            .unwrap()
            .committed()
            .unwrap();

        assert_eq!(gateway.request_count(), 1);
        let stk = &txn.payments[1];
        assert_eq!(stk.method, PaymentMethod::MpesaStk);
        assert_ne!(stk.reference.as_deref(), Some("TYPEDBYHAND"));
        assert_eq!(stk.reference.as_ref().map(String::len), Some(10));
    }

    /// Adds a product to the till's cart while the customer is still on the
    /// phone, then confirms.
    struct EditsCartWhilePending {
        cart: CartState,
    }

    #[async_trait::async_trait]
    impl MobileMoneyGateway for EditsCartWhilePending {
        async fn request_payment(
            &self,
            _request: &StkPushRequest,
        ) -> Result<StkConfirmation, GatewayError> {
            self.cart
                .update(|c| {
                    c.add_line(
                        mauzo_core::CartLine::new("maji", "Maji 1L", Money::from_major(50), 1),
                        None,
                    )
                })
                .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
            Ok(StkConfirmation {
                receipt_code: "RKT4Q8W2ZX".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_lines_added_during_push_survive_commit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let placeholder = Arc::new(SimulatedMobileMoneyGateway::confirming(Duration::ZERO));
        let till = Till::with_database(TillConfig::default(), db.clone(), placeholder).unwrap();
        let recorder = TransactionRecorder::new(
            till.session().clone(),
            db,
            till.events().clone(),
            Arc::new(EditsCartWhilePending {
                cart: till.cart().clone(),
            }),
            Duration::from_secs(1),
        );

        stock(&till, "sukari", Money::from_major(500), None).await;
        till.start_shift(Money::zero()).await.unwrap();
        till.add_to_cart("sukari", 1).await.unwrap();

        let txn = recorder
            .record_transaction(
                till.cart(),
                Tender::full(PaymentMethod::MpesaStk, Money::from_major(500)),
                None,
                &no_cancel(),
            )
            .await
            .unwrap()
            .committed()
            .unwrap();

        assert_eq!(txn.items.len(), 1);
        assert_eq!(txn.payments[0].reference.as_deref(), Some("RKT4Q8W2ZX"));
        let left = till.cart().snapshot().unwrap();
        assert_eq!(left.line_count(), 1);
        assert_eq!(left.lines()[0].product_id, "maji");
    }

    #[tokio::test]
    async fn test_document_number_uses_commit_date() {
        let till = till().await;
        stock(&till, "unga", Money::from_major(200), None).await;
        till.start_shift(Money::zero()).await.unwrap();
        till.add_to_cart("unga", 1).await.unwrap();

        let txn = till
            .record_transaction(
                Tender::full(PaymentMethod::Cash, Money::from_major(200)),
                None,
                &no_cancel(),
            )
            .await
            .unwrap()
            .committed()
            .unwrap();

        let day = txn.timestamp.format("%Y%m%d").to_string();
        assert_eq!(txn.receipt_number, format!("RCP-{day}-0001"));
    }

    #[tokio::test]
    async fn test_cancelled_push_commits_nothing() {
        let till = till_with(Arc::new(SimulatedMobileMoneyGateway::confirming(
            Duration::from_secs(30),
        )))
        .await;
        stock(&till, "sukari", Money::from_major(500), None).await;
        till.start_shift(Money::zero()).await.unwrap();
        till.add_to_cart("sukari", 1).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = till
            .record_transaction(
                Tender::full(PaymentMethod::MpesaStk, Money::from_major(500)),
                None,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TillError::AsyncPaymentCancelled));
        assert_eq!(till.cart().snapshot().unwrap().line_count(), 1);
        assert_eq!(active(&till).await.payment_totals.mpesa, Money::zero());
    }

    #[tokio::test]
    async fn test_split_allocator_with_credit_customer() {
        let till = till().await;
        stock(&till, "mafuta", Money::from_major(1000), None).await;
        till.start_shift(Money::zero()).await.unwrap();
        till.add_to_cart("mafuta", 1).await.unwrap();

        let mut split = SplitAllocator::new(till.cart().snapshot().unwrap().total());
        split.add_entry(PaymentMethod::Cash, Money::from_major(400)).unwrap();
        split.select_customer(CustomerRef::new("C1", "Jane"));
        split.add_entry(PaymentMethod::Credit, Money::from_major(600)).unwrap();

        let txn = till
            .recorder()
            .record_split(till.cart(), split, &no_cancel())
            .await
            .unwrap()
            .committed()
            .unwrap();

        assert!(txn.is_invoice);
        assert_eq!(txn.paid_amount(), Some(Money::from_major(400)));
        assert_eq!(txn.outstanding(), Money::from_major(600));

        let paid = till
            .recorder()
            .update_transaction_status(&txn.id, TransactionStatus::Paid, Some("QK7H2M9XPL".into()))
            .await
            .unwrap();
        assert_eq!(paid.paid_amount(), Some(Money::from_major(1000)));

        let shift = active(&till).await;
        assert_eq!(shift.payment_totals.credit, Money::from_major(600));
        assert_eq!(shift.payment_totals.cash, Money::from_major(400));
    }

    #[tokio::test]
    async fn test_status_change_and_delete_leave_totals() {
        let till = till().await;
        stock(&till, "unga", Money::from_major(200), None).await;
        till.start_shift(Money::zero()).await.unwrap();
        till.add_to_cart("unga", 1).await.unwrap();
        let txn = till
            .record_transaction(
                Tender::full(PaymentMethod::Cash, Money::from_major(200)),
                None,
                &no_cancel(),
            )
            .await
            .unwrap()
            .committed()
            .unwrap();

        let err = till
            .recorder()
            .update_transaction_status(&txn.id, TransactionStatus::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TillError::Core(CoreError::InvalidStatusTransition { .. })
        ));

        let refunded = till
            .recorder()
            .update_transaction_status(&txn.id, TransactionStatus::Refunded, None)
            .await
            .unwrap();
        assert_eq!(refunded.status, TransactionStatus::Refunded);

        till.recorder().delete_transaction(&txn.id).await.unwrap();
        assert!(matches!(
            till.recorder().get_transaction(&txn.id).await,
            Err(TillError::Core(CoreError::TransactionNotFound(_)))
        ));
        assert_eq!(active(&till).await.payment_totals.cash, Money::from_major(200));
    }

    #[tokio::test]
    async fn test_stock_limits_cart() {
        let till = till().await;
        stock(&till, "soda", Money::from_major(70), Some(3)).await;

        till.add_to_cart("soda", 2).await.unwrap();
        let err = till.add_to_cart("soda", 2).await.unwrap_err();
        assert!(matches!(
            err,
            TillError::Core(CoreError::InsufficientStock { .. })
        ));
        assert_eq!(till.cart().snapshot().unwrap().total_quantity(), 2);

        assert!(matches!(
            till.add_to_cart("missing", 1).await,
            Err(TillError::Db(DbError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_logout_closes_session() {
        let till = till().await;
        till.start_shift(Money::from_major(100)).await.unwrap();
        till.logout().await.unwrap();

        assert!(matches!(
            till.close_shift().await,
            Err(TillError::SessionClosed)
        ));
        assert!(matches!(
            till.shifts().get_active_shift().await,
            Err(TillError::SessionClosed)
        ));
        let shift = till.database().shifts().get_active().await.unwrap();
        assert!(shift.is_some());
    }
}
