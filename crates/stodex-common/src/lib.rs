pub mod decimal;
pub mod error;
pub mod variable;

pub use decimal::*;
pub use error::*;
pub use variable::*;

pub use bigdecimal::BigDecimal;
