use chrono::Utc;
use sea_orm::Database;

use engine::{
    DepositNew, EmailDigest, ExpenseItemNew, ExpenseNew, Ledger, LedgerError, Money,
    ReceiptUpdate, TransactionFilter, TransactionKind, TransactionUpdate, UserNew, WithdrawalNew,
};
use migration::MigratorTrait;

async fn ledger() -> Ledger {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Ledger::new(db)
}

async fn new_user(ledger: &Ledger, name: &str) -> i32 {
    ledger
        .create_user(UserNew {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            email_opt_in: true,
            email_transactions: EmailDigest::Last3,
        })
        .await
        .unwrap()
}

fn money(raw: &str) -> Money {
    raw.parse().unwrap()
}

async fn balance(ledger: &Ledger, user_id: i32) -> Money {
    ledger.user(user_id).await.unwrap().balance
}

/// The stored balance must equal the sum of signed transaction amounts.
async fn assert_invariant(ledger: &Ledger, user_id: i32) {
    let stored = balance(ledger, user_id).await;
    let recomputed = ledger.recompute_balance(user_id).await.unwrap();
    assert_eq!(stored, recomputed, "balance invariant broken for {user_id}");
}

fn deposit(user_id: i32, amount: &str) -> DepositNew {
    DepositNew {
        user_id,
        amount: money(amount),
        description: "Deposit".to_string(),
        date: Utc::now(),
        notes: None,
    }
}

fn withdrawal(user_id: i32, amount: &str) -> WithdrawalNew {
    WithdrawalNew {
        user_id,
        amount: money(amount),
        description: "Withdrawal".to_string(),
        date: Utc::now(),
        notes: None,
    }
}

fn expense(buyer_id: i32, items: Vec<ExpenseItemNew>) -> ExpenseNew {
    ExpenseNew {
        buyer_id,
        description: "Groceries".to_string(),
        date: Utc::now(),
        items,
        receipt_path: None,
        notes: None,
    }
}

fn item(name: &str, price: &str, debtor_id: i32) -> ExpenseItemNew {
    ExpenseItemNew {
        name: name.to_string(),
        price: money(price),
        debtor_id,
    }
}

fn keep_update(
    description: &str,
    from_user_id: Option<i32>,
    to_user_id: Option<i32>,
    amount: Option<&str>,
) -> TransactionUpdate {
    TransactionUpdate {
        description: description.to_string(),
        date: None,
        notes: None,
        from_user_id,
        to_user_id,
        amount: amount.map(money),
        items: Vec::new(),
        receipt: ReceiptUpdate::Keep,
    }
}

#[tokio::test]
async fn deposit_credits_the_user() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice").await;

    ledger.deposit(deposit(alice, "25.00")).await.unwrap();

    assert_eq!(balance(&ledger, alice).await, money("25.00"));
    assert_invariant(&ledger, alice).await;
}

#[tokio::test]
async fn withdrawal_may_overdraw() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice").await;

    ledger.withdraw(withdrawal(alice, "30.00")).await.unwrap();

    // Negative balances represent debt.
    assert_eq!(balance(&ledger, alice).await, money("-30.00"));
    assert_invariant(&ledger, alice).await;
}

#[tokio::test]
async fn deposit_withdraw_delete_roundtrip() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice").await;

    ledger.deposit(deposit(alice, "50.00")).await.unwrap();
    assert_eq!(balance(&ledger, alice).await, money("50.00"));

    let withdrawal_id = ledger.withdraw(withdrawal(alice, "30.00")).await.unwrap();
    assert_eq!(balance(&ledger, alice).await, money("20.00"));

    ledger.delete_transaction(withdrawal_id).await.unwrap();
    assert_eq!(balance(&ledger, alice).await, money("50.00"));
    assert_invariant(&ledger, alice).await;
}

#[tokio::test]
async fn ten_dimes_sum_exactly() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice").await;

    for _ in 0..10 {
        ledger.deposit(deposit(alice, "0.10")).await.unwrap();
    }

    assert_eq!(balance(&ledger, alice).await, money("1.00"));
    assert_invariant(&ledger, alice).await;
}

#[tokio::test]
async fn expense_single_debtor_groups_items() {
    let ledger = ledger().await;
    let bob = new_user(&ledger, "Bob").await;
    let carol = new_user(&ledger, "Carol").await;

    let ids = ledger
        .expense(expense(
            bob,
            vec![item("Pizza", "10.00", carol), item("Drink", "5.00", carol)],
        ))
        .await
        .unwrap();

    assert_eq!(ids.len(), 1);
    let tx = ledger.transaction(ids[0]).await.unwrap();
    assert_eq!(tx.kind, TransactionKind::Expense);
    assert_eq!(tx.amount, money("15.00"));
    assert_eq!(tx.from_user_id, Some(carol));
    assert_eq!(tx.to_user_id, Some(bob));
    assert_eq!(tx.items.len(), 2);

    assert_eq!(balance(&ledger, bob).await, money("15.00"));
    assert_eq!(balance(&ledger, carol).await, money("-15.00"));
    assert_invariant(&ledger, bob).await;
    assert_invariant(&ledger, carol).await;
}

#[tokio::test]
async fn expense_split_across_debtors() {
    let ledger = ledger().await;
    let buyer = new_user(&ledger, "Buyer").await;
    let dana = new_user(&ledger, "Dana").await;
    let erin = new_user(&ledger, "Erin").await;

    // The buyer's own item is absorbed and creates no transaction.
    let ids = ledger
        .expense(expense(
            buyer,
            vec![
                item("Bread", "2.50", dana),
                item("Cheese", "7.50", dana),
                item("Wine", "12.00", erin),
                item("Chocolate", "3.00", buyer),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(ids.len(), 2);
    // Buyer gains the total owed by the debtors, debtor decreases sum to it.
    assert_eq!(balance(&ledger, buyer).await, money("22.00"));
    assert_eq!(balance(&ledger, dana).await, money("-10.00"));
    assert_eq!(balance(&ledger, erin).await, money("-12.00"));
    for user in [buyer, dana, erin] {
        assert_invariant(&ledger, user).await;
    }

    // The self-bought item is not persisted anywhere.
    for id in ids {
        let tx = ledger.transaction(id).await.unwrap();
        assert!(tx.items.iter().all(|i| i.name != "Chocolate"));
    }
}

#[tokio::test]
async fn expense_with_only_buyer_items_is_a_no_op() {
    let ledger = ledger().await;
    let buyer = new_user(&ledger, "Buyer").await;

    let ids = ledger
        .expense(expense(buyer, vec![item("Snack", "4.00", buyer)]))
        .await
        .unwrap();

    assert!(ids.is_empty());
    assert_eq!(balance(&ledger, buyer).await, Money::ZERO);
}

#[tokio::test]
async fn expense_delete_restores_both_parties() {
    let ledger = ledger().await;
    let bob = new_user(&ledger, "Bob").await;
    let carol = new_user(&ledger, "Carol").await;

    let ids = ledger
        .expense(expense(bob, vec![item("Pizza", "18.00", carol)]))
        .await
        .unwrap();
    ledger.delete_transaction(ids[0]).await.unwrap();

    assert_eq!(balance(&ledger, bob).await, Money::ZERO);
    assert_eq!(balance(&ledger, carol).await, Money::ZERO);
    assert_invariant(&ledger, bob).await;
    assert_invariant(&ledger, carol).await;

    // Item rows are gone with the transaction.
    assert!(matches!(
        ledger.transaction(ids[0]).await,
        Err(LedgerError::NotFound(_))
    ));
}

#[tokio::test]
async fn edit_amount_shifts_by_difference() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice").await;

    let id = ledger.deposit(deposit(alice, "50.00")).await.unwrap();

    // Several intermediate edits must not accumulate drift.
    for amount in ["70.00", "10.00", "80.00"] {
        ledger
            .update_transaction(id, keep_update("Deposit", None, Some(alice), Some(amount)))
            .await
            .unwrap();
    }

    assert_eq!(balance(&ledger, alice).await, money("80.00"));
    assert_invariant(&ledger, alice).await;
}

#[tokio::test]
async fn edit_reassigns_deposit_between_users() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice").await;
    let bob = new_user(&ledger, "Bob").await;

    let id = ledger.deposit(deposit(alice, "50.00")).await.unwrap();
    assert_eq!(balance(&ledger, alice).await, money("50.00"));

    ledger
        .update_transaction(id, keep_update("Deposit", None, Some(bob), Some("50.00")))
        .await
        .unwrap();

    assert_eq!(balance(&ledger, alice).await, Money::ZERO);
    assert_eq!(balance(&ledger, bob).await, money("50.00"));
    assert_invariant(&ledger, alice).await;
    assert_invariant(&ledger, bob).await;
}

#[tokio::test]
async fn edit_items_fully_replace_and_recompute_amount() {
    let ledger = ledger().await;
    let bob = new_user(&ledger, "Bob").await;
    let carol = new_user(&ledger, "Carol").await;

    let ids = ledger
        .expense(expense(bob, vec![item("Pizza", "10.00", carol)]))
        .await
        .unwrap();
    let id = ids[0];

    let mut update = keep_update("Groceries", Some(carol), Some(bob), None);
    update.items = vec![item("Sushi", "20.00", carol), item("Tea", "2.50", carol)];
    ledger.update_transaction(id, update).await.unwrap();

    let tx = ledger.transaction(id).await.unwrap();
    assert_eq!(tx.amount, money("22.50"));
    let names: Vec<&str> = tx.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["Sushi", "Tea"]);

    assert_eq!(balance(&ledger, bob).await, money("22.50"));
    assert_eq!(balance(&ledger, carol).await, money("-22.50"));
    assert_invariant(&ledger, bob).await;
    assert_invariant(&ledger, carol).await;
}

#[tokio::test]
async fn edit_rejects_parties_that_do_not_match_the_kind() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice").await;
    let bob = new_user(&ledger, "Bob").await;

    let id = ledger.deposit(deposit(alice, "10.00")).await.unwrap();

    // A deposit cannot gain a paying user.
    let err = ledger
        .update_transaction(id, keep_update("Deposit", Some(bob), Some(alice), None))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransaction(_)));

    // The failed edit must not leave a half-applied balance change.
    assert_eq!(balance(&ledger, alice).await, money("10.00"));
    assert_eq!(balance(&ledger, bob).await, Money::ZERO);
    assert_invariant(&ledger, alice).await;
    assert_invariant(&ledger, bob).await;
}

#[tokio::test]
async fn failed_edit_rolls_back_entirely() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice").await;

    let id = ledger.deposit(deposit(alice, "10.00")).await.unwrap();

    // Reassigning to a nonexistent user aborts the whole unit of work.
    let err = ledger
        .update_transaction(id, keep_update("Deposit", None, Some(9999), None))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let tx = ledger.transaction(id).await.unwrap();
    assert_eq!(tx.to_user_id, Some(alice));
    assert_eq!(balance(&ledger, alice).await, money("10.00"));
    assert_invariant(&ledger, alice).await;
}

#[tokio::test]
async fn rejects_non_positive_amounts() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice").await;

    let err = ledger.deposit(deposit(alice, "0.00")).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));

    let err = ledger
        .expense(expense(alice, vec![item("Free", "0", alice)]))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
}

#[tokio::test]
async fn rejects_unknown_parties() {
    let ledger = ledger().await;

    let err = ledger.deposit(deposit(424242, "5.00")).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let err = ledger.delete_transaction(424242).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn failed_expense_leaves_no_partial_state() {
    let ledger = ledger().await;
    let buyer = new_user(&ledger, "Buyer").await;
    let dana = new_user(&ledger, "Dana").await;

    // Second debtor does not exist; the whole submission must roll back.
    let err = ledger
        .expense(expense(
            buyer,
            vec![item("Bread", "2.00", dana), item("Milk", "1.50", 9999)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    assert_eq!(balance(&ledger, buyer).await, Money::ZERO);
    assert_eq!(balance(&ledger, dana).await, Money::ZERO);
    assert_invariant(&ledger, buyer).await;
    assert_invariant(&ledger, dana).await;
}

#[tokio::test]
async fn duplicate_users_are_rejected() {
    let ledger = ledger().await;
    new_user(&ledger, "Alice").await;

    let err = ledger
        .create_user(UserNew {
            name: "Alice".to_string(),
            email: "other@example.com".to_string(),
            email_opt_in: true,
            email_transactions: EmailDigest::Last3,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));
}

#[tokio::test]
async fn toggle_active_flips_listing() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice").await;

    assert_eq!(ledger.users(true).await.unwrap().len(), 1);
    assert!(!ledger.toggle_user_active(alice).await.unwrap());
    assert_eq!(ledger.users(true).await.unwrap().len(), 0);
    assert_eq!(ledger.users(false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn search_matches_item_names_and_filters() {
    let ledger = ledger().await;
    let bob = new_user(&ledger, "Bob").await;
    let carol = new_user(&ledger, "Carol").await;

    ledger.deposit(deposit(bob, "100.00")).await.unwrap();
    let mut with_receipt = expense(bob, vec![item("Pizza Margherita", "12.00", carol)]);
    with_receipt.receipt_path = Some("2026/01/10/receipt.pdf".to_string());
    ledger.expense(with_receipt).await.unwrap();

    let page = ledger
        .search_transactions(
            &TransactionFilter {
                text: Some("margherita".to_string()),
                ..Default::default()
            },
            1,
            25,
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].kind, TransactionKind::Expense);

    let page = ledger
        .search_transactions(
            &TransactionFilter {
                kind: Some(TransactionKind::Deposit),
                ..Default::default()
            },
            1,
            25,
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].kind, TransactionKind::Deposit);

    let page = ledger
        .search_transactions(
            &TransactionFilter {
                has_receipt: true,
                ..Default::default()
            },
            1,
            25,
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let page = ledger
        .search_transactions(
            &TransactionFilter {
                user_id: Some(carol),
                amount_min: Some(money("10.00")),
                ..Default::default()
            },
            1,
            25,
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn invariant_holds_through_a_mixed_sequence() {
    let ledger = ledger().await;
    let alice = new_user(&ledger, "Alice").await;
    let bob = new_user(&ledger, "Bob").await;

    ledger.deposit(deposit(alice, "120.00")).await.unwrap();
    ledger.withdraw(withdrawal(alice, "45.50")).await.unwrap();
    let ids = ledger
        .expense(expense(bob, vec![item("Dinner", "33.10", alice)]))
        .await
        .unwrap();
    ledger
        .update_transaction(
            ids[0],
            keep_update("Dinner", Some(alice), Some(bob), Some("40.00")),
        )
        .await
        .unwrap();
    ledger.withdraw(withdrawal(bob, "12.34")).await.unwrap();
    ledger.delete_transaction(ids[0]).await.unwrap();

    assert_invariant(&ledger, alice).await;
    assert_invariant(&ledger, bob).await;
    assert_eq!(balance(&ledger, alice).await, money("74.50"));
    assert_eq!(balance(&ledger, bob).await, money("-12.34"));
}
