//! Settings accessors: `get(key, default)` / `set(key, value)` plus typed
//! helpers on top of the `settings` table.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sea_orm::{ActiveModelTrait, ActiveValue, EntityTrait, QueryOrder};

use crate::{Ledger, ResultLedger, settings};

impl Ledger {
    /// Returns the stored value for `key`, or `default` when unset.
    pub async fn setting(&self, key: &str, default: &str) -> ResultLedger<String> {
        let stored = settings::Entity::find_by_id(key).one(&self.database).await?;
        Ok(stored.map_or_else(|| default.to_string(), |model| model.value))
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub async fn set_setting(&self, key: &str, value: &str) -> ResultLedger<()> {
        match settings::Entity::find_by_id(key).one(&self.database).await? {
            Some(model) => {
                let mut row: settings::ActiveModel = model.into();
                row.value = ActiveValue::Set(value.to_string());
                row.update(&self.database).await?;
            }
            None => {
                settings::ActiveModel {
                    key: ActiveValue::Set(key.to_string()),
                    value: ActiveValue::Set(value.to_string()),
                }
                .insert(&self.database)
                .await?;
            }
        }
        Ok(())
    }

    /// Boolean settings are stored as `"1"`/`"0"`.
    pub async fn setting_bool(&self, key: &str, default: bool) -> ResultLedger<bool> {
        let default = if default { "1" } else { "0" };
        Ok(self.setting(key, default).await? == "1")
    }

    /// Integer setting; malformed values fall back to `default`.
    pub async fn setting_i64(&self, key: &str, default: i64) -> ResultLedger<i64> {
        let raw = self.setting(key, &default.to_string()).await?;
        Ok(raw.trim().parse().unwrap_or(default))
    }

    /// Template/theme setting, falling back to the code-level default.
    pub async fn template(&self, key: &str) -> ResultLedger<String> {
        self.setting(key, settings::template_default(key)).await
    }

    /// The configured timezone; unknown names fall back to UTC.
    pub async fn timezone(&self) -> ResultLedger<Tz> {
        let name = self.setting("timezone", "UTC").await?;
        Ok(name.parse().unwrap_or(chrono_tz::UTC))
    }

    /// The current datetime in the configured timezone.
    pub async fn now_local(&self) -> ResultLedger<DateTime<Tz>> {
        Ok(Utc::now().with_timezone(&self.timezone().await?))
    }

    /// All stored settings, ordered by key.
    pub async fn settings_snapshot(&self) -> ResultLedger<Vec<(String, String)>> {
        let models = settings::Entity::find()
            .order_by_asc(settings::Column::Key)
            .all(&self.database)
            .await?;
        Ok(models
            .into_iter()
            .map(|model| (model.key, model.value))
            .collect())
    }
}
