//! Writers and pruning for the job debug log tables.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

use crate::{LOG_KEEP, Ledger, ResultLedger, logs};

impl Ledger {
    pub async fn log_email(
        &self,
        level: &str,
        recipient: Option<&str>,
        message: &str,
    ) -> ResultLedger<()> {
        logs::email::ActiveModel {
            sent_at: ActiveValue::Set(Utc::now()),
            level: ActiveValue::Set(level.to_string()),
            recipient: ActiveValue::Set(recipient.map(str::to_string)),
            message: ActiveValue::Set(message.to_string()),
            ..Default::default()
        }
        .insert(&self.database)
        .await?;
        Ok(())
    }

    pub async fn log_backup(&self, level: &str, message: &str) -> ResultLedger<()> {
        logs::backup::ActiveModel {
            ran_at: ActiveValue::Set(Utc::now()),
            level: ActiveValue::Set(level.to_string()),
            message: ActiveValue::Set(message.to_string()),
            ..Default::default()
        }
        .insert(&self.database)
        .await?;
        Ok(())
    }

    pub(crate) async fn log_auto_collect(
        &self,
        level: &str,
        category: &str,
        message: &str,
    ) -> ResultLedger<()> {
        logs::auto_collect::ActiveModel {
            ran_at: ActiveValue::Set(Utc::now()),
            level: ActiveValue::Set(level.to_string()),
            category: ActiveValue::Set(category.to_string()),
            message: ActiveValue::Set(message.to_string()),
            ..Default::default()
        }
        .insert(&self.database)
        .await?;
        Ok(())
    }

    /// Keeps only the newest [`LOG_KEEP`] email log rows.
    pub async fn prune_email_logs(&self) -> ResultLedger<()> {
        let oldest_kept = logs::email::Entity::find()
            .order_by_desc(logs::email::Column::Id)
            .offset(LOG_KEEP)
            .one(&self.database)
            .await?;
        if let Some(model) = oldest_kept {
            logs::email::Entity::delete_many()
                .filter(logs::email::Column::Id.lte(model.id))
                .exec(&self.database)
                .await?;
        }
        Ok(())
    }

    /// Keeps only the newest [`LOG_KEEP`] auto-collect log rows.
    pub async fn prune_auto_collect_logs(&self) -> ResultLedger<()> {
        let oldest_kept = logs::auto_collect::Entity::find()
            .order_by_desc(logs::auto_collect::Column::Id)
            .offset(LOG_KEEP)
            .one(&self.database)
            .await?;
        if let Some(model) = oldest_kept {
            logs::auto_collect::Entity::delete_many()
                .filter(logs::auto_collect::Column::Id.lte(model.id))
                .exec(&self.database)
                .await?;
        }
        Ok(())
    }
}
