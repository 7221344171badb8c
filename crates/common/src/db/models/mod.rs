//! SeaORM entity models
//!
//! Database entities for PaperDesk

mod paper;
mod user;

pub use paper::{
    Entity as PaperEntity,
    Model as PaperRow,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
};

pub use user::{
    Entity as UserEntity,
    Model as UserRow,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};
