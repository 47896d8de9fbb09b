//! Common-value auto-collection.
//!
//! Scans the ledger for item names, descriptions, and prices that recur at
//! least `*_threshold` times and promotes them into the `common_*` suggestion
//! tables, skipping blacklisted values. Runs on its own schedule; progress is
//! recorded in `auto_collect_logs` when `common_auto_debug` is on.

use std::collections::HashSet;

use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    Statement,
};

use crate::{Ledger, Money, ResultLedger, common};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoCollectOutcome {
    pub added: u64,
    pub skipped: u64,
}

impl Ledger {
    async fn blacklist_values(&self, kind: &str) -> ResultLedger<HashSet<String>> {
        let rows = common::blacklist::Entity::find()
            .filter(common::blacklist::Column::Kind.eq(kind))
            .all(&self.database)
            .await?;
        Ok(rows.into_iter().map(|row| row.value).collect())
    }

    /// One auto-collect pass over items, descriptions, and prices.
    pub async fn auto_collect_common(&self) -> ResultLedger<AutoCollectOutcome> {
        let debug = self.setting_bool("common_auto_debug", false).await?;
        let backend = self.database.get_database_backend();
        let mut outcome = AutoCollectOutcome::default();

        if self.setting_bool("common_items_auto", false).await? {
            let threshold = self.setting_i64("common_items_threshold", 5).await?;
            let blacklisted: HashSet<String> = self
                .blacklist_values("item")
                .await?
                .into_iter()
                .map(|value| value.to_lowercase())
                .collect();
            let stmt = Statement::from_sql_and_values(
                backend,
                "SELECT item_name AS value, COUNT(id) AS n FROM expense_items \
                 GROUP BY item_name HAVING COUNT(id) >= ?",
                [threshold.into()],
            );
            for row in self.database.query_all(stmt).await? {
                let name: String = row.try_get("", "value")?;
                if blacklisted.contains(&name.to_lowercase()) {
                    if debug {
                        self.log_auto_collect("SKIP", "item", &format!("\"{name}\" (blacklist)"))
                            .await?;
                    }
                    outcome.skipped += 1;
                } else if common::items::Entity::find()
                    .filter(common::items::Column::Name.eq(&name))
                    .one(&self.database)
                    .await?
                    .is_none()
                {
                    common::items::ActiveModel {
                        name: ActiveValue::Set(name.clone()),
                        ..Default::default()
                    }
                    .insert(&self.database)
                    .await?;
                    if debug {
                        self.log_auto_collect("ADDED", "item", &format!("Added \"{name}\""))
                            .await?;
                    }
                    outcome.added += 1;
                }
            }
        }

        if self.setting_bool("common_descriptions_auto", false).await? {
            let threshold = self.setting_i64("common_descriptions_threshold", 5).await?;
            let blacklisted: HashSet<String> = self
                .blacklist_values("description")
                .await?
                .into_iter()
                .map(|value| value.to_lowercase())
                .collect();
            let stmt = Statement::from_sql_and_values(
                backend,
                "SELECT description AS value, COUNT(id) AS n FROM transactions \
                 GROUP BY description HAVING COUNT(id) >= ?",
                [threshold.into()],
            );
            for row in self.database.query_all(stmt).await? {
                let description: String = row.try_get("", "value")?;
                if blacklisted.contains(&description.to_lowercase()) {
                    if debug {
                        self.log_auto_collect(
                            "SKIP",
                            "description",
                            &format!("\"{description}\" (blacklist)"),
                        )
                        .await?;
                    }
                    outcome.skipped += 1;
                } else if common::descriptions::Entity::find()
                    .filter(common::descriptions::Column::Value.eq(&description))
                    .one(&self.database)
                    .await?
                    .is_none()
                {
                    common::descriptions::ActiveModel {
                        value: ActiveValue::Set(description.clone()),
                        ..Default::default()
                    }
                    .insert(&self.database)
                    .await?;
                    if debug {
                        self.log_auto_collect(
                            "ADDED",
                            "description",
                            &format!("Added \"{description}\""),
                        )
                        .await?;
                    }
                    outcome.added += 1;
                }
            }
        }

        if self.setting_bool("common_prices_auto", false).await? {
            let threshold = self.setting_i64("common_prices_threshold", 5).await?;
            // Price blacklist entries are stored as formatted amounts.
            let blacklisted = self.blacklist_values("price").await?;
            let stmt = Statement::from_sql_and_values(
                backend,
                "SELECT price_cents AS value, COUNT(id) AS n FROM expense_items \
                 GROUP BY price_cents HAVING COUNT(id) >= ?",
                [threshold.into()],
            );
            for row in self.database.query_all(stmt).await? {
                let cents: i64 = row.try_get("", "value")?;
                let price = Money::new(cents);
                if blacklisted.contains(&price.to_string()) {
                    if debug {
                        self.log_auto_collect("SKIP", "price", &format!("{price} (blacklist)"))
                            .await?;
                    }
                    outcome.skipped += 1;
                } else if common::prices::Entity::find()
                    .filter(common::prices::Column::ValueCents.eq(cents))
                    .one(&self.database)
                    .await?
                    .is_none()
                {
                    common::prices::ActiveModel {
                        value_cents: ActiveValue::Set(cents),
                        ..Default::default()
                    }
                    .insert(&self.database)
                    .await?;
                    if debug {
                        self.log_auto_collect("ADDED", "price", &format!("Added {price}"))
                            .await?;
                    }
                    outcome.added += 1;
                }
            }
        }

        if debug {
            self.log_auto_collect(
                "INFO",
                "system",
                &format!(
                    "Run complete: {} added, {} skipped",
                    outcome.added, outcome.skipped
                ),
            )
            .await?;
            self.prune_auto_collect_logs().await?;
        }

        tracing::info!(
            added = outcome.added,
            skipped = outcome.skipped,
            "auto-collect run complete"
        );
        Ok(outcome)
    }
}
