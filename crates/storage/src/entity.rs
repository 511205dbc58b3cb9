pub mod monitor {
    use sea_orm::entity::prelude::*;

    /// Registry row maintained by the monitor management API. This crate only
    /// reads it.
    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "monitor")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub name: String,
        pub address: String,
        pub audio_path: Option<String>,
        pub created_at: Option<i64>,
        pub updated_at: Option<i64>,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
