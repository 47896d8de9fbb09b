//! Debug log tables for the background jobs.
//!
//! Ring-buffer style: the jobs prune each table down to the newest 500 rows
//! after a run, and only write at all when the matching `*_debug` setting is
//! on.

pub const LOG_KEEP: u64 = 500;

pub mod auto_collect {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "auto_collect_logs")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub ran_at: DateTimeUtc,
        pub level: String,
        pub category: String,
        pub message: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod email {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "email_logs")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub sent_at: DateTimeUtc,
        pub level: String,
        pub recipient: Option<String>,
        pub message: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod backup {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "backup_logs")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub ran_at: DateTimeUtc,
        pub level: String,
        pub message: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
