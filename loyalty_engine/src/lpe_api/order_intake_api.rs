use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderNumber},
    helpers::is_valid_luhn,
    lpe_api::errors::OrderIntakeError,
    traits::{InsertOrderResult, OrderManagement},
};

/// `OrderIntakeApi` handles the upload of new orders by users, and answers questions about them.
///
/// Uploaded orders start out as `NEW`, and are picked up by the accrual reconciliation pipeline from there.
pub struct OrderIntakeApi<B> {
    db: B,
}

impl<B> Debug for OrderIntakeApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderIntakeApi")
    }
}

impl<B> OrderIntakeApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderIntakeApi<B>
where B: OrderManagement
{
    /// Registers a new order for the user.
    ///
    /// The number must pass the Luhn check. Uploading the same number twice is reported with
    /// [`OrderIntakeError::AlreadyUploaded`] (which carries the existing order) if it is the same user, and with
    /// [`OrderIntakeError::UploadedByAnotherUser`] otherwise.
    pub async fn create_order(&self, user_id: i64, number: &str) -> Result<Order, OrderIntakeError> {
        let number = number.trim();
        if !is_valid_luhn(number) {
            debug!("📦️ Rejecting invalid order number '{number}' from user #{user_id}");
            return Err(OrderIntakeError::InvalidOrderNumber(number.to_string()));
        }
        let order = NewOrder::new(user_id, OrderNumber::from(number));
        match self.db.insert_order(order).await? {
            InsertOrderResult::Inserted(order) => {
                info!("📦️ Order {} uploaded by user #{user_id}", order.number);
                Ok(order)
            },
            InsertOrderResult::AlreadyExists(order) if order.user_id == user_id => {
                Err(OrderIntakeError::AlreadyUploaded(Box::new(order)))
            },
            InsertOrderResult::AlreadyExists(order) => {
                warn!("📦️ User #{user_id} tried to upload order {}, which belongs to another user", order.number);
                Err(OrderIntakeError::UploadedByAnotherUser)
            },
        }
    }

    /// The user's orders, newest first.
    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderIntakeError> {
        let orders = self.db.fetch_orders_for_user(user_id).await?;
        Ok(orders)
    }

    pub async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderIntakeError> {
        let order = self.db.fetch_order_by_number(number).await?;
        Ok(order)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{db_types::OrderStatusType, test_utils::prepare_env::fresh_database, AccountManagement};

    #[tokio::test]
    async fn upload_orders() {
        let db = fresh_database().await;
        let alice = db.create_user("alice").await.unwrap().id;
        let bob = db.create_user("bob").await.unwrap().id;
        let api = OrderIntakeApi::new(db.clone());

        let order = api.create_order(alice, "79927398713").await.unwrap();
        assert_eq!(order.user_id, alice);
        assert_eq!(order.status, OrderStatusType::New);
        assert_eq!(order.accrual, lpg_common::Points::zero());

        match api.create_order(alice, "79927398713").await {
            Err(OrderIntakeError::AlreadyUploaded(existing)) => assert_eq!(existing.id, order.id),
            other => panic!("Expected AlreadyUploaded, got {other:?}"),
        }
        assert!(matches!(api.create_order(bob, "79927398713").await, Err(OrderIntakeError::UploadedByAnotherUser)));
        assert!(matches!(
            api.create_order(alice, "12345678901").await,
            Err(OrderIntakeError::InvalidOrderNumber(n)) if n == "12345678901"
        ));
        assert!(matches!(api.create_order(alice, "").await, Err(OrderIntakeError::InvalidOrderNumber(_))));
        assert!(matches!(api.create_order(9_999, "12345678903").await, Err(OrderIntakeError::UnknownUser(9_999))));
    }

    #[tokio::test]
    async fn orders_are_listed_newest_first() {
        let db = fresh_database().await;
        let alice = db.create_user("alice").await.unwrap().id;
        let bob = db.create_user("bob").await.unwrap().id;
        let api = OrderIntakeApi::new(db.clone());
        for number in ["79927398713", "4532015112830366", "12345678903"] {
            api.create_order(alice, number).await.unwrap();
        }
        api.create_order(bob, "0").await.unwrap();

        let orders = api.orders_for_user(alice).await.unwrap();
        let numbers = orders.iter().map(|o| o.number.as_str()).collect::<Vec<_>>();
        assert_eq!(numbers, vec!["12345678903", "4532015112830366", "79927398713"]);
        assert!(api.orders_for_user(9_999).await.unwrap().is_empty());

        let order = api.order_by_number(&OrderNumber::from("0")).await.unwrap().unwrap();
        assert_eq!(order.user_id, bob);
        assert!(api.order_by_number(&OrderNumber::from("18")).await.unwrap().is_none());
    }
}
