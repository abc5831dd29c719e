pub mod domain;
pub mod error;
pub mod page;
pub mod policy;
pub mod ports;

pub use domain::{
    AuthSession, Brand, BrandChanges, BrandCredentials, InvalidTransition, NewBrand, NewOrder,
    NewProduct, NewUser, Order, OrderStatus, Principal, PrincipalKind, Product, ProductChanges,
    Role, User, UserChanges, UserCredentials, MAX_ORDER_QUANTITY, MAX_ORDER_TOTAL, MAX_PRICE,
};
pub use error::{ErrorKind, ServiceError};
pub use page::Page;
pub use policy::{authorize, list_scope, Action, ListScope, Resource, Target};
pub use ports::{CacheService, DatabaseService, PortError, PortResult, SessionStore};
