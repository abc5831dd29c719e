//! services/api/src/services/orders.rs
//!
//! Order placement and the `pending -> accepted` transition.
//!
//! Placement gathers the buyer, the product and the product's brand, freezes the
//! product into the order and inserts it with one store call. That single insert
//! is the atomicity boundary; nothing is written before it.

use marketplace_core::{
    authorize, list_scope, Action, DatabaseService, InvalidTransition, ListScope, NewOrder, Order,
    OrderStatus, Page, PortError, Principal, PrincipalKind, Resource, ServiceError, SessionStore,
    Target,
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::{store_err, BrandService, EntityCache, ProductService, UserService};

#[derive(Clone)]
pub struct OrderService {
    db: Arc<dyn DatabaseService>,
    cache: EntityCache<Order>,
    sessions: Arc<dyn SessionStore>,
    users: UserService,
    products: ProductService,
    brands: BrandService,
}

impl OrderService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        cache: EntityCache<Order>,
        sessions: Arc<dyn SessionStore>,
        users: UserService,
        products: ProductService,
        brands: BrandService,
    ) -> Self {
        Self {
            db,
            cache,
            sessions,
            users,
            products,
            brands,
        }
    }

    /// Places an order for the user behind `session_id`.
    pub async fn place_order(
        &self,
        principal: &Principal,
        session_id: &str,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Order, ServiceError> {
        authorize(principal, Action::Create(Resource::Order), Target::none())?;

        let session = self.sessions.get_session(session_id).await.map_err(|e| match e {
            PortError::NotFound(_) => ServiceError::Unauthenticated,
            other => ServiceError::Port(other),
        })?;
        if session.principal_kind != PrincipalKind::User {
            return Err(ServiceError::Forbidden);
        }

        let user = self.users.find_by_id_cached(session.principal_id).await?;
        let product = self.products.find_by_id_cached(product_id).await?;
        let brand = self
            .brands
            .find_by_id_cached(product.brand_id)
            .await
            .map_err(|e| match e {
                ServiceError::NotFound(_) => {
                    error!(
                        product_id = %product_id,
                        brand_id = %product.brand_id,
                        "product references a missing brand"
                    );
                    ServiceError::StoreInconsistent(format!(
                        "brand {} of product {} is missing",
                        product.brand_id, product_id
                    ))
                }
                other => other,
            })?;

        let new_order = NewOrder::place(&user, &product, &brand, quantity)?;
        let order = self.db.create_order(new_order).await?;
        self.cache.set(order.order_id, &order).await;
        info!(
            order_id = %order.order_id,
            user_id = %order.user_id,
            brand_id = %order.brand_id,
            "placed order"
        );
        Ok(order)
    }

    /// Moves a pending order to accepted. Reads the store directly, not the cache.
    pub async fn accept_order(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<Order, ServiceError> {
        let mut order = self
            .db
            .find_order_by_id(order_id)
            .await
            .map_err(store_err("Order"))?;
        authorize(principal, Action::AcceptOrder, Target::order(&order))?;

        let seen = order.status;
        order.status = seen.accept()?;
        let order = self
            .db
            .update_order_by_id(&order, seen)
            .await
            .map_err(|e| match e {
                // A concurrent accept won between the read and the write.
                PortError::Conflict(_) => ServiceError::from(InvalidTransition {
                    from: OrderStatus::Accepted,
                    to: OrderStatus::Accepted,
                }),
                other => store_err("Order")(other),
            })?;
        self.cache.set(order.order_id, &order).await;
        info!(order_id = %order.order_id, "accepted order");
        Ok(order)
    }

    pub async fn find(&self, principal: &Principal, order_id: Uuid) -> Result<Order, ServiceError> {
        let order = self
            .cache
            .find_through(order_id, "Order", || self.db.find_order_by_id(order_id))
            .await?;
        authorize(principal, Action::Read(Resource::Order), Target::order(&order))?;
        Ok(order)
    }

    /// Lists orders visible to `principal`, optionally narrowed to one brand.
    pub async fn list(
        &self,
        principal: &Principal,
        brand_filter: Option<Uuid>,
        page: Page,
    ) -> Result<Vec<Order>, ServiceError> {
        let rows = match (list_scope(principal, Resource::Order), brand_filter) {
            (ListScope::All, None) => self.db.find_all_orders(page).await?,
            (ListScope::All, Some(brand_id)) => {
                self.db.find_all_orders_by_brand_id(brand_id, page).await?
            }
            (ListScope::OwnedByUser(user_id), None) => {
                self.db.find_all_orders_by_user_id(user_id, page).await?
            }
            (ListScope::OwnedByUser(user_id), Some(brand_id)) => {
                self.db
                    .find_all_orders_by_user_id_and_brand_id(user_id, brand_id, page)
                    .await?
            }
            (ListScope::OwnedByBrand(own), Some(requested)) if own != requested => Vec::new(),
            (ListScope::OwnedByBrand(own), _) => {
                self.db.find_all_orders_by_brand_id(own, page).await?
            }
            (ListScope::Nothing, _) => Vec::new(),
        };
        Ok(rows)
    }

    pub async fn delete(&self, principal: &Principal, order_id: Uuid) -> Result<(), ServiceError> {
        let order = self
            .cache
            .find_through(order_id, "Order", || self.db.find_order_by_id(order_id))
            .await?;
        authorize(principal, Action::Delete(Resource::Order), Target::order(&order))?;

        self.db.delete_order_by_id(order_id).await.map_err(store_err("Order"))?;
        self.cache.delete(order_id).await;
        info!(order_id = %order_id, "deleted order");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryCache, MemoryDb, MemorySessionStore};
    use crate::auth::PasswordService;
    use crate::services::{CreateProduct, RegisterBrand, RegisterUser};
    use marketplace_core::{
        Brand, CacheService, Product, ProductChanges, Role, User, MAX_ORDER_QUANTITY,
    };
    use rust_decimal::Decimal;
    use std::time::Duration;

    struct Fixture {
        orders: OrderService,
        users: UserService,
        brands: BrandService,
        products: ProductService,
        sessions: Arc<dyn SessionStore>,
    }

    fn fixture() -> Fixture {
        let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
        let cache: Arc<dyn CacheService> = Arc::new(MemoryCache::new());
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let passwords = PasswordService::with_params(8, 1, 1).unwrap();
        let ttl = Duration::from_secs(60);

        let users = UserService::new(
            db.clone(),
            EntityCache::new(cache.clone(), "user", ttl),
            passwords.clone(),
        );
        let brands = BrandService::new(
            db.clone(),
            EntityCache::new(cache.clone(), "brand", ttl),
            passwords,
        );
        let products = ProductService::new(
            db.clone(),
            EntityCache::new(cache.clone(), "product", ttl),
            brands.clone(),
        );
        let orders = OrderService::new(
            db,
            EntityCache::new(cache, "order", ttl),
            sessions.clone(),
            users.clone(),
            products.clone(),
            brands.clone(),
        );
        Fixture {
            orders,
            users,
            brands,
            products,
            sessions,
        }
    }

    async fn seed(f: &Fixture) -> (User, Brand, Product, String) {
        let user = f
            .users
            .register(RegisterUser {
                email: "u@b.c".to_string(),
                password: "pw12345".to_string(),
                first_name: "U".to_string(),
                last_name: "U".to_string(),
                delivery_address: "D".to_string(),
                role: Role::User,
                avatar: None,
            })
            .await
            .unwrap();
        let admin = Principal::Admin { user_id: Uuid::new_v4() };
        let brand = f
            .brands
            .register(
                &admin,
                RegisterBrand {
                    brand_name: "BR".to_string(),
                    email: "shop@br.test".to_string(),
                    password: "pw12345".to_string(),
                    pickup_address: "P".to_string(),
                    logo: None,
                },
            )
            .await
            .unwrap();
        let product = f
            .products
            .create(
                &brand.principal(),
                CreateProduct {
                    name: "PR".to_string(),
                    description: String::new(),
                    price: Decimal::new(1000, 1),
                    brand_id: None,
                },
            )
            .await
            .unwrap();
        let session = f
            .sessions
            .create_session(user.user_id, PrincipalKind::User, Duration::from_secs(60))
            .await
            .unwrap();
        (user, brand, product, session.session_id)
    }

    #[tokio::test]
    async fn order_keeps_its_snapshot_after_price_change() {
        let f = fixture();
        let (user, brand, product, session_id) = seed(&f).await;

        let order = f
            .orders
            .place_order(&user.principal(), &session_id, product.product_id, 3)
            .await
            .unwrap();
        assert_eq!(order.total_price, Decimal::from(300));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.delivery_source_address, "P");
        assert_eq!(order.delivery_destination_address, "D");

        f.products
            .update(
                &brand.principal(),
                product.product_id,
                ProductChanges {
                    price: Some(Decimal::from(200)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let reread = f.orders.find(&user.principal(), order.order_id).await.unwrap();
        assert_eq!(reread.total_price, Decimal::from(300));
        assert_eq!(reread.item.price, Decimal::from(100));
    }

    #[tokio::test]
    async fn accept_is_brand_only_and_happens_once() {
        let f = fixture();
        let (user, brand, product, session_id) = seed(&f).await;
        let order = f
            .orders
            .place_order(&user.principal(), &session_id, product.product_id, 1)
            .await
            .unwrap();

        assert!(matches!(
            f.orders.accept_order(&user.principal(), order.order_id).await,
            Err(ServiceError::Forbidden)
        ));
        let accepted = f.orders.accept_order(&brand.principal(), order.order_id).await.unwrap();
        assert_eq!(accepted.status, OrderStatus::Accepted);
        assert_eq!(
            f.orders.find(&user.principal(), order.order_id).await.unwrap().status,
            OrderStatus::Accepted
        );

        let err = f.orders.accept_order(&brand.principal(), order.order_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_accepts_succeed_once() {
        let f = fixture();
        let (user, brand, product, session_id) = seed(&f).await;

        for _ in 0..20 {
            let order_id = f
                .orders
                .place_order(&user.principal(), &session_id, product.product_id, 1)
                .await
                .unwrap()
                .order_id;

            let attempts: Vec<_> = (0..4)
                .map(|_| {
                    let orders = f.orders.clone();
                    let principal = brand.principal();
                    tokio::spawn(async move { orders.accept_order(&principal, order_id).await })
                })
                .collect();

            let mut accepted = 0;
            for attempt in attempts {
                match attempt.await.unwrap() {
                    Ok(order) => {
                        assert_eq!(order.status, OrderStatus::Accepted);
                        accepted += 1;
                    }
                    Err(e) => assert!(matches!(e, ServiceError::InvalidTransition(_)), "{:?}", e),
                }
            }
            assert_eq!(accepted, 1);
        }
    }

    #[tokio::test]
    async fn quantity_above_the_cap_is_rejected() {
        let f = fixture();
        let (user, _, product, session_id) = seed(&f).await;
        let err = f
            .orders
            .place_order(
                &user.principal(),
                &session_id,
                product.product_id,
                MAX_ORDER_QUANTITY + 1,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn revoked_session_cannot_order() {
        let f = fixture();
        let (user, _, product, session_id) = seed(&f).await;
        f.sessions.delete_session(&session_id).await.unwrap();

        let err = f
            .orders
            .place_order(&user.principal(), &session_id, product.product_id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let f = fixture();
        let (user, _, _, session_id) = seed(&f).await;
        let err = f
            .orders
            .place_order(&user.principal(), &session_id, Uuid::new_v4(), 1)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn listings_are_scoped_to_the_parties() {
        let f = fixture();
        let (user, brand, product, session_id) = seed(&f).await;
        f.orders
            .place_order(&user.principal(), &session_id, product.product_id, 1)
            .await
            .unwrap();

        let stranger = Principal::User { user_id: Uuid::new_v4() };
        assert!(f
            .orders
            .list(&stranger, None, Page::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            f.orders
                .list(&user.principal(), None, Page::default())
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            f.orders
                .list(&user.principal(), Some(brand.brand_id), Page::default())
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            f.orders
                .list(&brand.principal(), None, Page::default())
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(f
            .orders
            .list(&brand.principal(), Some(Uuid::new_v4()), Page::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn only_admins_delete_orders() {
        let f = fixture();
        let (user, _, product, session_id) = seed(&f).await;
        let order = f
            .orders
            .place_order(&user.principal(), &session_id, product.product_id, 1)
            .await
            .unwrap();

        assert!(f.orders.delete(&user.principal(), order.order_id).await.is_err());
        let admin = Principal::Admin { user_id: Uuid::new_v4() };
        f.orders.delete(&admin, order.order_id).await.unwrap();
        assert!(f.orders.find(&admin, order.order_id).await.unwrap_err().is_not_found());
    }
}
