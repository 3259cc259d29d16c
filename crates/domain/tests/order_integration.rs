//! Integration tests for the Order aggregate.
//!
//! These tests drive an order from entry through processing and
//! cancellation against an in-process catalog, applying each planned
//! transition the way a store does.

use std::collections::HashMap;

use domain::{
    ClientId, DomainError, Money, NewProduct, Order, OrderDraft, OrderState, Product, ProductId,
    Transition, apply_movements, validate_entry,
};

fn catalog(items: &[(&str, i64, i64)]) -> (HashMap<ProductId, Product>, Vec<ProductId>) {
    let mut products = HashMap::new();
    let mut ids = Vec::new();
    for (sku, cents, stock) in items {
        let product =
            Product::register(NewProduct::new(*sku, *sku, Money::from_cents(*cents), *stock))
                .unwrap();
        ids.push(product.id);
        products.insert(product.id, product);
    }
    (products, ids)
}

/// Applies a transition the way a store does: stock first, then state.
fn commit(
    order: &mut Order,
    transition: &Transition,
    products: &mut HashMap<ProductId, Product>,
) -> Result<(), DomainError> {
    assert_eq!(order.state(), transition.from);
    apply_movements(&transition.movements, products)?;
    order.apply(transition);
    Ok(())
}

mod order_lifecycle {
    use super::*;

    #[test]
    fn complete_order_lifecycle() {
        let (mut products, ids) = catalog(&[("P1", 500, 10)]);
        let draft = OrderDraft::new(ClientId::new()).line(ids[0], 3);

        let lines = validate_entry(&draft, &products).unwrap();
        let mut order = Order::place(draft.client_id, None, lines);
        assert_eq!(order.state(), OrderState::New);
        assert_eq!(order.total(), Money::from_cents(1500));
        assert_eq!(products[&ids[0]].stock, 10);

        let process = order.process().unwrap();
        commit(&mut order, &process, &mut products).unwrap();
        assert_eq!(order.state(), OrderState::Processed);
        assert_eq!(products[&ids[0]].stock, 7);

        let cancel = order.cancel().unwrap();
        commit(&mut order, &cancel, &mut products).unwrap();
        assert_eq!(order.state(), OrderState::Cancelled);
        assert_eq!(products[&ids[0]].stock, 10);

        assert!(order.cancel().is_none());
    }

    #[test]
    fn price_snapshot_survives_catalog_change() {
        let (mut products, ids) = catalog(&[("P1", 500, 10)]);
        let draft = OrderDraft::new(ClientId::new()).line(ids[0], 2);
        let order = Order::place(draft.client_id, None, validate_entry(&draft, &products).unwrap());

        if let Some(product) = products.get_mut(&ids[0]) {
            product.price = Money::from_cents(900);
        }

        assert_eq!(order.lines()[0].unit_price, Money::from_cents(500));
        assert_eq!(order.total(), Money::from_cents(1000));
    }
}

mod stock_rules {
    use super::*;

    #[test]
    fn failed_process_changes_no_product() {
        let (mut products, ids) = catalog(&[("PEN", 100, 5), ("PAD", 100, 5)]);
        let draft = OrderDraft::new(ClientId::new())
            .line(ids[0], 2)
            .line(ids[1], 4);
        let mut order = Order::place(
            draft.client_id,
            None,
            validate_entry(&draft, &products).unwrap(),
        );

        // Someone else sold most of the pads in the meantime
        if let Some(pad) = products.get_mut(&ids[1]) {
            pad.stock = 1;
        }

        let process = order.process().unwrap();
        let err = commit(&mut order, &process, &mut products).unwrap_err();

        let shortage = match err {
            DomainError::InsufficientStock(shortage) => shortage,
            other => panic!("expected insufficient stock, got {other:?}"),
        };
        assert_eq!(shortage.shortfalls().len(), 1);
        assert_eq!(shortage.shortfalls()[0].requested, 4);
        assert_eq!(shortage.shortfalls()[0].available, 1);
        assert_eq!(products[&ids[0]].stock, 5);
        assert_eq!(products[&ids[1]].stock, 1);
        assert_eq!(order.state(), OrderState::New);
    }

    #[test]
    fn every_shortfall_is_reported() {
        let (products, ids) = catalog(&[("PEN", 100, 1), ("PAD", 100, 2)]);
        let draft = OrderDraft::new(ClientId::new())
            .line(ids[0], 3)
            .line(ids[1], 3);

        let Err(DomainError::InsufficientStock(shortage)) = validate_entry(&draft, &products)
        else {
            panic!("expected insufficient stock");
        };
        assert_eq!(shortage.shortfalls().len(), 2);
        assert!(shortage.shortfalls().iter().all(|s| s.line.is_some()));
    }

    #[test]
    fn processed_order_cannot_be_processed_again() {
        let (mut products, ids) = catalog(&[("P1", 500, 10)]);
        let draft = OrderDraft::new(ClientId::new()).line(ids[0], 1);
        let mut order = Order::place(
            draft.client_id,
            None,
            validate_entry(&draft, &products).unwrap(),
        );
        let process = order.process().unwrap();
        commit(&mut order, &process, &mut products).unwrap();

        assert!(matches!(
            order.process(),
            Err(DomainError::InvalidTransition {
                current_state: OrderState::Processed,
                ..
            })
        ));
    }
}
