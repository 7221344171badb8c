//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub author_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    /// Author-typed order, duplicates kept
    pub keywords: Vec<String>,

    /// Array of contact objects as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub contributors: Json,

    #[sea_orm(column_type = "JsonBinary")]
    pub point_of_contact: Json,

    #[sea_orm(column_type = "Text")]
    pub file_path: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub cover_letter_path: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub reviewer_status: Option<String>,

    pub reviewer_id: Option<Uuid>,

    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_remark: Option<String>,

    pub rejection_date: Option<DateTimeWithTimeZone>,

    pub current_version: i32,

    pub submission_date: DateTimeWithTimeZone,

    pub last_updated: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id"
    )]
    Author,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
