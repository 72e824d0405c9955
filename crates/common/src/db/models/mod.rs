//! SeaORM entity models
//!
//! Database entities for PaperVault

mod paper;
mod password_reset;
mod session;
mod user;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    Role,
};

pub use paper::{
    Entity as PaperEntity,
    Model as Paper,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
};

pub use session::{
    Entity as SessionEntity,
    Model as Session,
    ActiveModel as SessionActiveModel,
    Column as SessionColumn,
};

pub use password_reset::{
    Entity as ResetTokenEntity,
    Model as ResetToken,
    ActiveModel as ResetTokenActiveModel,
    Column as ResetTokenColumn,
};
