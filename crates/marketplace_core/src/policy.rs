//! crates/marketplace_core/src/policy.rs
//!
//! Role and ownership based access rules. Decisions depend only on the caller's
//! `Principal` and the owners of the resource being touched, so the evaluator is
//! pure and runs after the resource has been loaded.

use uuid::Uuid;

use crate::domain::{Brand, Order, Principal, Product, User};
use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Brand,
    Product,
    Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create(Resource),
    Read(Resource),
    Update(Resource),
    Delete(Resource),
    AcceptOrder,
}

/// The owners of the resource an action targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Target {
    pub user_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
}

impl Target {
    /// No owner yet, e.g. for creates.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn user(user: &User) -> Self {
        Self {
            user_id: Some(user.user_id),
            brand_id: None,
        }
    }

    pub fn brand(brand: &Brand) -> Self {
        Self {
            user_id: None,
            brand_id: Some(brand.brand_id),
        }
    }

    pub fn product(product: &Product) -> Self {
        Self {
            user_id: None,
            brand_id: Some(product.brand_id),
        }
    }

    pub fn order(order: &Order) -> Self {
        Self {
            user_id: Some(order.user_id),
            brand_id: Some(order.brand_id),
        }
    }
}

/// Decides whether `principal` may perform `action` on `target`.
///
/// Rules, first match wins:
/// 1. admins may do anything;
/// 2. updates and deletes of users, brands and products need the caller to own the row;
/// 3. accepting an order needs the brand the order was placed with;
/// 4. only users place orders, only brands create products;
/// 5. users, brands and products are readable by any caller, an order only by its
///    user or brand;
/// 6. everything else is denied.
pub fn authorize(
    principal: &Principal,
    action: Action,
    target: Target,
) -> Result<(), ServiceError> {
    if principal.is_admin() {
        return Ok(());
    }

    let allowed = match action {
        Action::Update(resource) | Action::Delete(resource) => match (resource, principal) {
            (Resource::User, Principal::User { user_id }) => target.user_id == Some(*user_id),
            (Resource::Brand | Resource::Product, Principal::Brand { brand_id }) => {
                target.brand_id == Some(*brand_id)
            }
            _ => false,
        },
        Action::AcceptOrder => match principal {
            Principal::Brand { brand_id } => target.brand_id == Some(*brand_id),
            _ => false,
        },
        Action::Create(Resource::Order) => matches!(principal, Principal::User { .. }),
        Action::Create(Resource::Product) => matches!(principal, Principal::Brand { .. }),
        Action::Read(Resource::Order) => match principal {
            Principal::User { user_id } => target.user_id == Some(*user_id),
            Principal::Brand { brand_id } => target.brand_id == Some(*brand_id),
            Principal::Admin { .. } => true,
        },
        Action::Read(_) => true,
        Action::Create(_) => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

/// The subset of rows a list endpoint may return to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    All,
    OwnedByUser(Uuid),
    OwnedByBrand(Uuid),
    Nothing,
}

/// Scopes a listing of `resource` by the caller's principal. Entry is never denied.
pub fn list_scope(principal: &Principal, resource: Resource) -> ListScope {
    match (principal, resource) {
        (Principal::Admin { .. }, _) => ListScope::All,
        (Principal::User { user_id }, Resource::Order | Resource::User) => {
            ListScope::OwnedByUser(*user_id)
        }
        (Principal::User { .. }, Resource::Product | Resource::Brand) => ListScope::All,
        (Principal::Brand { brand_id }, Resource::Order | Resource::Product | Resource::Brand) => {
            ListScope::OwnedByBrand(*brand_id)
        }
        (Principal::Brand { .. }, Resource::User) => ListScope::Nothing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn admin_is_always_allowed() {
        let admin = Principal::Admin { user_id: Uuid::new_v4() };
        for action in [
            Action::Create(Resource::Brand),
            Action::Delete(Resource::Brand),
            Action::Update(Resource::Order),
            Action::AcceptOrder,
        ] {
            assert!(authorize(&admin, action, Target::none()).is_ok());
        }
    }

    #[test]
    fn brand_cannot_update_another_brand() {
        let (b1, b2) = ids();
        let caller = Principal::Brand { brand_id: b1 };
        let other = Target { user_id: None, brand_id: Some(b2) };
        let own = Target { user_id: None, brand_id: Some(b1) };

        assert!(matches!(
            authorize(&caller, Action::Update(Resource::Brand), other),
            Err(ServiceError::Forbidden)
        ));
        assert!(authorize(&caller, Action::Update(Resource::Brand), own).is_ok());
        assert!(authorize(&caller, Action::Delete(Resource::Product), own).is_ok());
    }

    #[test]
    fn user_owns_only_their_account() {
        let (u1, u2) = ids();
        let caller = Principal::User { user_id: u1 };
        let mine = Target { user_id: Some(u1), brand_id: None };
        let theirs = Target { user_id: Some(u2), brand_id: None };
        assert!(authorize(&caller, Action::Update(Resource::User), mine).is_ok());
        assert!(authorize(&caller, Action::Delete(Resource::User), theirs).is_err());
        // A user id never owns a product, even by coincidence of value.
        let product = Target { user_id: None, brand_id: Some(u1) };
        assert!(authorize(&caller, Action::Update(Resource::Product), product).is_err());
    }

    #[test]
    fn only_the_order_brand_accepts() {
        let (brand, other) = ids();
        let user = Uuid::new_v4();
        let target = Target { user_id: Some(user), brand_id: Some(brand) };
        let accept = |principal: Principal| authorize(&principal, Action::AcceptOrder, target);

        assert!(accept(Principal::Brand { brand_id: brand }).is_ok());
        assert!(accept(Principal::Brand { brand_id: other }).is_err());
        assert!(accept(Principal::User { user_id: user }).is_err());
    }

    #[test]
    fn creates_are_role_gated() {
        let user = Principal::User { user_id: Uuid::new_v4() };
        let brand = Principal::Brand { brand_id: Uuid::new_v4() };

        assert!(authorize(&user, Action::Create(Resource::Order), Target::none()).is_ok());
        assert!(authorize(&brand, Action::Create(Resource::Order), Target::none()).is_err());
        assert!(authorize(&brand, Action::Create(Resource::Product), Target::none()).is_ok());
        assert!(authorize(&user, Action::Create(Resource::Product), Target::none()).is_err());
        assert!(authorize(&brand, Action::Create(Resource::Brand), Target::none()).is_err());
    }

    #[test]
    fn orders_are_readable_by_their_parties_only() {
        let (user, brand) = ids();
        let target = Target { user_id: Some(user), brand_id: Some(brand) };
        let read = Action::Read(Resource::Order);
        let buyer = Principal::User { user_id: user };
        let seller = Principal::Brand { brand_id: brand };
        let stranger = Principal::User { user_id: Uuid::new_v4() };

        assert!(authorize(&buyer, read, target).is_ok());
        assert!(authorize(&seller, read, target).is_ok());
        assert!(authorize(&stranger, read, target).is_err());
        assert!(authorize(&stranger, Action::Read(Resource::Product), Target::none()).is_ok());
    }

    #[test]
    fn only_admins_change_orders_directly() {
        let (user, brand) = ids();
        let target = Target { user_id: Some(user), brand_id: Some(brand) };
        let buyer = Principal::User { user_id: user };
        let seller = Principal::Brand { brand_id: brand };
        assert!(authorize(&buyer, Action::Delete(Resource::Order), target).is_err());
        assert!(authorize(&seller, Action::Update(Resource::Order), target).is_err());
    }

    #[test]
    fn list_scopes_follow_principal() {
        let id = Uuid::new_v4();
        let admin = Principal::Admin { user_id: id };
        let user = Principal::User { user_id: id };
        let brand = Principal::Brand { brand_id: id };

        assert_eq!(list_scope(&admin, Resource::Order), ListScope::All);
        assert_eq!(list_scope(&user, Resource::Order), ListScope::OwnedByUser(id));
        assert_eq!(list_scope(&user, Resource::Product), ListScope::All);
        assert_eq!(list_scope(&user, Resource::Brand), ListScope::All);
        assert_eq!(list_scope(&brand, Resource::Order), ListScope::OwnedByBrand(id));
        assert_eq!(list_scope(&brand, Resource::Product), ListScope::OwnedByBrand(id));
        assert_eq!(list_scope(&brand, Resource::User), ListScope::Nothing);
    }
}
