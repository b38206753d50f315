mod consultancy;
mod payment;
mod reservation;

pub use consultancy::*;
pub use payment::*;
pub use reservation::*;
