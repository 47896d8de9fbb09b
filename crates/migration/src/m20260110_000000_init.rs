//! Initial schema migration - creates all tables from scratch.
//!
//! - `users`: household members with a stored running balance
//! - `transactions`: deposits, withdrawals, and per-debtor expense splits
//! - `expense_items`: itemized lines attached to expense transactions
//! - `settings`: key/value runtime configuration
//! - `common_items` / `common_descriptions` / `common_prices`: form suggestions
//! - `common_blacklist`: values excluded from auto-collection
//! - `auto_collect_logs` / `email_logs` / `backup_logs`: job debug logs

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Name,
    Email,
    BalanceCents,
    CreatedAt,
    IsActive,
    EmailOptIn,
    EmailTransactions,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    Date,
    Description,
    AmountCents,
    FromUserId,
    ToUserId,
    Kind,
    ReceiptPath,
    Notes,
}

#[derive(Iden)]
enum ExpenseItems {
    Table,
    Id,
    TransactionId,
    ItemName,
    PriceCents,
    BuyerId,
}

#[derive(Iden)]
enum Settings {
    Table,
    Key,
    Value,
}

#[derive(Iden)]
enum CommonItems {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum CommonDescriptions {
    Table,
    Id,
    Value,
}

#[derive(Iden)]
enum CommonPrices {
    Table,
    Id,
    ValueCents,
}

#[derive(Iden)]
enum CommonBlacklist {
    Table,
    Id,
    Kind,
    Value,
}

#[derive(Iden)]
enum AutoCollectLogs {
    Table,
    Id,
    RanAt,
    Level,
    Category,
    Message,
}

#[derive(Iden)]
enum EmailLogs {
    Table,
    Id,
    SentAt,
    Level,
    Recipient,
    Message,
}

#[derive(Iden)]
enum BackupLogs {
    Table,
    Id,
    RanAt,
    Level,
    Message,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Name)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Email)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Users::BalanceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Users::EmailOptIn)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Users::EmailTransactions)
                            .string_len(20)
                            .not_null()
                            .default("last3"),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::Date).timestamp().not_null())
                    .col(
                        ColumnDef::new(Transactions::Description)
                            .string_len(500)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::FromUserId).integer())
                    .col(ColumnDef::new(Transactions::ToUserId).integer())
                    .col(ColumnDef::new(Transactions::Kind).string_len(50).not_null())
                    .col(ColumnDef::new(Transactions::ReceiptPath).string_len(500))
                    .col(ColumnDef::new(Transactions::Notes).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-from_user_id")
                            .from(Transactions::Table, Transactions::FromUserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-to_user_id")
                            .from(Transactions::Table, Transactions::ToUserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-date")
                    .table(Transactions::Table)
                    .col(Transactions::Date)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-from_user_id")
                    .table(Transactions::Table)
                    .col(Transactions::FromUserId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-to_user_id")
                    .table(Transactions::Table)
                    .col(Transactions::ToUserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Expense items
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ExpenseItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExpenseItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExpenseItems::TransactionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpenseItems::ItemName)
                            .string_len(200)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpenseItems::PriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExpenseItems::BuyerId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_items-transaction_id")
                            .from(ExpenseItems::Table, ExpenseItems::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_items-buyer_id")
                            .from(ExpenseItems::Table, ExpenseItems::BuyerId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expense_items-transaction_id")
                    .table(ExpenseItems::Table)
                    .col(ExpenseItems::TransactionId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Settings
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Settings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Settings::Key)
                            .string_len(100)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Settings::Value).string_len(500).not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Common value suggestions + blacklist
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(CommonItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommonItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CommonItems::Name)
                            .string_len(200)
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CommonDescriptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommonDescriptions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CommonDescriptions::Value)
                            .string_len(500)
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CommonPrices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommonPrices::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CommonPrices::ValueCents)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CommonBlacklist::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommonBlacklist::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CommonBlacklist::Kind)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CommonBlacklist::Value)
                            .string_len(500)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-common_blacklist-kind-value-unique")
                    .table(CommonBlacklist::Table)
                    .col(CommonBlacklist::Kind)
                    .col(CommonBlacklist::Value)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Job debug logs
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(AutoCollectLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AutoCollectLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AutoCollectLogs::RanAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(AutoCollectLogs::Level)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AutoCollectLogs::Category)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AutoCollectLogs::Message)
                            .string_len(500)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmailLogs::SentAt).timestamp().not_null())
                    .col(ColumnDef::new(EmailLogs::Level).string_len(10).not_null())
                    .col(ColumnDef::new(EmailLogs::Recipient).string_len(200))
                    .col(ColumnDef::new(EmailLogs::Message).string_len(500).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BackupLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BackupLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BackupLogs::RanAt).timestamp().not_null())
                    .col(ColumnDef::new(BackupLogs::Level).string_len(10).not_null())
                    .col(
                        ColumnDef::new(BackupLogs::Message)
                            .string_len(500)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BackupLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmailLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AutoCollectLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CommonBlacklist::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CommonPrices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CommonDescriptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CommonItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Settings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExpenseItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
