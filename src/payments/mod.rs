mod mercadopago;
mod notification;
mod reconcile;
pub mod signature;

pub use mercadopago::*;
pub use notification::*;
pub use reconcile::*;
