//! Integration tests for the restaurant service.
//!
//! These tests drive orders from intake to billing against the in-memory
//! store and check the occupancy, aggregation and atomicity guarantees.

use common::{
    EmployeeId, Money, Order, Product, ProductId, Status, Table, TableNumber, TableStatus,
};
use domain::{
    AdvanceItem, BillTable, BulkAdvance, DomainError, ErrorKind, MAX_UNITS_PER_LINE, OpenOrder,
    OrderLine, OrderProgress, RestaurantService, ServiceConfig, TransitionPolicy,
};
use store::{Catalog, Change, ChangeSet, InMemoryStore, Store, StoreError};

fn catalog() -> InMemoryStore {
    InMemoryStore::with_catalog(
        (1..=4).map(Table::free),
        [
            Product::new("CAUSA", "Causa Limeña", "Entradas", Money::from_units(10)),
            Product::new("LOMO", "Lomo Saltado", "Fondos", Money::from_cents(3890)),
            Product::new("PISCO", "Pisco Sour", "Bebidas", Money::from_cents(2250)),
        ],
    )
}

/// Helper to create a test service over a fresh catalog
fn create_service() -> RestaurantService<InMemoryStore> {
    RestaurantService::new(catalog())
}

fn open(table: u32, lines: &[(&str, i64)]) -> OpenOrder {
    OpenOrder::new(
        TableNumber::new(table),
        EmployeeId::new(),
        lines.iter().map(|(p, q)| OrderLine::new(*p, *q)).collect(),
    )
}

async fn table_status(service: &RestaurantService<InMemoryStore>, number: u32) -> TableStatus {
    service
        .store()
        .find_table_by_number(TableNumber::new(number))
        .await
        .unwrap()
        .unwrap()
        .status
}

/// Checks that every table is occupied exactly when it has a non-invoiced order.
async fn assert_occupancy_consistent(service: &RestaurantService<InMemoryStore>) {
    let orders = service.store().fetch_all_orders().await.unwrap();
    for table in service.tables().await.unwrap() {
        let has_open = orders
            .iter()
            .any(|order| order.table == table.number && order.is_open());
        assert_eq!(
            table.is_occupied(),
            has_open,
            "table {} occupancy out of sync",
            table.number
        );
    }
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn full_table_lifecycle() {
        let service = create_service();
        let cashier = EmployeeId::new();

        // 1. Open an order for two units on a free table
        let order = service.open_order(open(3, &[("CAUSA", 2)])).await.unwrap();
        assert_eq!(order.status, Status::Requested);
        assert_eq!(order.items.len(), 2);
        assert!(order.items.iter().all(|i| i.status == Status::Requested));
        assert_eq!(table_status(&service, 3).await, TableStatus::Occupied);
        assert_occupancy_consistent(&service).await;

        // 2. Finalize everything at once
        let outcome = service
            .bulk_advance(cashier, BulkAdvance::new(order.id, Status::Finalized))
            .await
            .unwrap();
        assert_eq!(outcome.items_changed, 2);
        assert_eq!(outcome.progress, OrderProgress::Promoted(Status::Finalized));
        let stored = service.order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Finalized);
        assert!(stored.finished_at.is_some());
        for item in &stored.items {
            assert_eq!(item.status, Status::Finalized);
            assert!(item.finalized_at.is_some());
            assert!(item.prep_start.is_none());
            assert!(item.prep_end.is_none());
        }

        // 3. Bill the table
        let invoice = service
            .bill_table(cashier, BillTable::new(TableNumber::new(3)))
            .await
            .unwrap();
        assert_eq!(invoice.lines.len(), 1);
        assert_eq!(invoice.lines[0].product_id, ProductId::new("CAUSA"));
        assert_eq!(invoice.lines[0].quantity, 2);
        assert_eq!(invoice.lines[0].unit_price, Money::from_units(10));
        assert_eq!(invoice.lines[0].subtotal, Money::from_units(20));
        assert_eq!(invoice.total, Money::from_units(20));
        assert_eq!(invoice.waiter, order.waiter);

        let stored = service.order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Invoiced);
        assert_eq!(table_status(&service, 3).await, TableStatus::Free);
        assert_eq!(service.invoice(invoice.id).await.unwrap(), Some(invoice));
        assert_occupancy_consistent(&service).await;
    }

    #[tokio::test]
    async fn two_finalized_orders_collapse_into_one_line() {
        let service = create_service();
        let cashier = EmployeeId::new();

        let first = service
            .open_order(open(2, &[("PISCO", 1), ("LOMO", 1)]))
            .await
            .unwrap();

        // A second order on the same table can only come from another writer,
        // so it is inserted directly through the store.
        let mut second = first.clone();
        second.id = common::OrderId::new();
        second.created_at = first.created_at + chrono::Duration::minutes(10);
        second.items = vec![common::LineItem::requested(
            second.id,
            ProductId::new("PISCO"),
            second.created_at,
        )];
        service
            .store()
            .commit(ChangeSet::new().with(Change::InsertOrder(second.clone())))
            .await
            .unwrap();

        for id in [first.id, second.id] {
            service
                .bulk_advance(cashier, BulkAdvance::new(id, Status::Finalized))
                .await
                .unwrap();
        }

        let invoice = service
            .bill_table(cashier, BillTable::new(TableNumber::new(2)))
            .await
            .unwrap();

        assert_eq!(invoice.lines.len(), 2);
        let pisco = invoice
            .lines
            .iter()
            .find(|line| line.product_id == ProductId::new("PISCO"))
            .unwrap();
        assert_eq!(pisco.quantity, 2);
        assert_eq!(pisco.subtotal, Money::from_cents(4500));
        assert_eq!(invoice.total, Money::from_cents(4500 + 3890));

        for id in [first.id, second.id] {
            let order = service.order(id).await.unwrap().unwrap();
            assert_eq!(order.status, Status::Invoiced);
        }
        assert_eq!(table_status(&service, 2).await, TableStatus::Free);
    }

    #[tokio::test]
    async fn billing_without_finalized_orders_fails() {
        let service = create_service();
        let cashier = EmployeeId::new();

        let result = service
            .bill_table(cashier, BillTable::new(TableNumber::new(4)))
            .await;
        assert!(matches!(result, Err(DomainError::NoFinalizedOrders(_))));

        // An open but unfinished order does not count either
        service.open_order(open(4, &[("LOMO", 1)])).await.unwrap();
        let result = service
            .bill_table(cashier, BillTable::new(TableNumber::new(4)))
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AggregationEmpty);
        assert!(service.invoices().await.unwrap().is_empty());
        assert_eq!(table_status(&service, 4).await, TableStatus::Occupied);
    }

    #[tokio::test]
    async fn backward_item_transition_is_a_no_op() {
        let service = create_service();
        let cook = EmployeeId::new();
        let order = service.open_order(open(1, &[("LOMO", 1)])).await.unwrap();
        let item_id = order.items[0].id;

        service
            .advance_item(cook, AdvanceItem::new(item_id, Status::InPreparation))
            .await
            .unwrap();

        let outcome = service
            .advance_item(cook, AdvanceItem::new(item_id, Status::Requested))
            .await
            .unwrap();
        assert_eq!(outcome.progress, OrderProgress::Unchanged);
        assert_eq!(outcome.items_changed, 0);

        let item = service.store().fetch_line_item(item_id).await.unwrap().unwrap();
        assert_eq!(item.status, Status::InPreparation);
    }
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn kitchen_flow_records_preparation_time() {
        let service = create_service();
        let cook = EmployeeId::new();
        let order = service.open_order(open(1, &[("LOMO", 1)])).await.unwrap();
        let item_id = order.items[0].id;

        for target in [Status::InPreparation, Status::Delivered] {
            let outcome = service
                .advance_item(cook, AdvanceItem::new(item_id, target))
                .await
                .unwrap();
            assert_eq!(outcome.progress, OrderProgress::Promoted(target));
        }

        let item = service.store().fetch_line_item(item_id).await.unwrap().unwrap();
        let start = item.prep_start.unwrap();
        let end = item.prep_end.unwrap();
        assert!(end >= start);
        assert_eq!(item.prep_duration_minutes, Some((end - start).num_minutes()));
    }

    #[tokio::test]
    async fn order_follows_the_slowest_item() {
        let service = create_service();
        let cook = EmployeeId::new();
        let order = service.open_order(open(1, &[("PISCO", 2)])).await.unwrap();
        let (a, b) = (order.items[0].id, order.items[1].id);

        let outcome = service
            .advance_item(cook, AdvanceItem::new(a, Status::Delivered))
            .await
            .unwrap();
        assert_eq!(outcome.progress, OrderProgress::Partial);
        assert_eq!(outcome.order.status, Status::Requested);

        let outcome = service
            .advance_item(cook, AdvanceItem::new(b, Status::Delivered))
            .await
            .unwrap();
        assert_eq!(outcome.progress, OrderProgress::Promoted(Status::Delivered));

        let stored = service.order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Delivered);
        assert!(stored.all_items_at(Status::Delivered));
    }

    #[tokio::test]
    async fn bulk_advance_is_partial_when_an_item_is_ahead() {
        let service = create_service();
        let cook = EmployeeId::new();
        let order = service.open_order(open(1, &[("CAUSA", 3)])).await.unwrap();

        service
            .advance_item(cook, AdvanceItem::new(order.items[0].id, Status::Finalized))
            .await
            .unwrap();

        let outcome = service
            .bulk_advance(cook, BulkAdvance::new(order.id, Status::Delivered))
            .await
            .unwrap();
        assert_eq!(outcome.items_changed, 2);
        assert_eq!(outcome.progress, OrderProgress::Partial);
        assert_eq!(outcome.order.items[0].status, Status::Finalized);

        // Catching up the rest promotes the order straight to Finalized
        let outcome = service
            .bulk_advance(cook, BulkAdvance::new(order.id, Status::Finalized))
            .await
            .unwrap();
        assert_eq!(outcome.progress, OrderProgress::Promoted(Status::Finalized));
    }

    #[tokio::test]
    async fn invoiced_is_unreachable_through_advances() {
        let service = create_service();
        let cook = EmployeeId::new();
        let order = service.open_order(open(1, &[("CAUSA", 1)])).await.unwrap();

        service
            .bulk_advance(cook, BulkAdvance::new(order.id, Status::Finalized))
            .await
            .unwrap();
        let outcome = service
            .bulk_advance(cook, BulkAdvance::new(order.id, Status::Invoiced))
            .await
            .unwrap();

        assert_eq!(outcome.progress, OrderProgress::Unchanged);
        let stored = service.order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Finalized);
    }

    #[tokio::test]
    async fn missing_order_and_item() {
        let service = create_service();
        let cook = EmployeeId::new();

        let result = service
            .bulk_advance(cook, BulkAdvance::new(common::OrderId::new(), Status::Delivered))
            .await;
        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));

        let result = service
            .advance_item(
                cook,
                AdvanceItem::new(common::LineItemId::new(), Status::Delivered),
            )
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, DomainError::ItemNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn order_queue_hides_invoiced_orders() {
        let service = create_service();
        let cashier = EmployeeId::new();
        let billed = service.open_order(open(1, &[("CAUSA", 1)])).await.unwrap();
        let waiting = service.open_order(open(2, &[("LOMO", 1)])).await.unwrap();

        service
            .bulk_advance(cashier, BulkAdvance::new(billed.id, Status::Finalized))
            .await
            .unwrap();
        service
            .bill_table(cashier, BillTable::new(TableNumber::new(1)))
            .await
            .unwrap();

        let queue = service.order_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, waiting.id);
    }
}

mod open_order_validation {
    use super::*;

    #[tokio::test]
    async fn unknown_table() {
        let service = create_service();
        let result = service.open_order(open(42, &[("LOMO", 1)])).await;
        assert!(matches!(result, Err(DomainError::TableNotFound(n)) if n.get() == 42));
    }

    #[tokio::test]
    async fn occupied_table() {
        let service = create_service();
        service.open_order(open(1, &[("LOMO", 1)])).await.unwrap();

        let result = service.open_order(open(1, &[("PISCO", 1)])).await;
        let err = result.unwrap_err();
        assert!(matches!(err, DomainError::TableOccupied(_)));
        assert_eq!(err.kind(), ErrorKind::ConflictingState);
        assert_eq!(service.store().order_count().await, 1);
    }

    #[tokio::test]
    async fn invalid_second_product_writes_nothing() {
        let service = create_service();

        let result = service
            .open_order(open(3, &[("LOMO", 1), ("CHAUFA", 2)]))
            .await;

        assert!(matches!(result, Err(DomainError::ProductNotFound(id)) if id.as_str() == "CHAUFA"));
        assert_eq!(service.store().order_count().await, 0);
        assert_eq!(table_status(&service, 3).await, TableStatus::Free);
    }

    #[tokio::test]
    async fn invalid_quantity_writes_nothing() {
        let service = create_service();

        let result = service.open_order(open(3, &[("LOMO", 2), ("PISCO", 0)])).await;

        let err = result.unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity { quantity: 0, .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(service.store().order_count().await, 0);
        assert_eq!(table_status(&service, 3).await, TableStatus::Free);
    }

    #[tokio::test]
    async fn huge_quantity_is_rejected() {
        let service = create_service();

        for quantity in [i64::MAX, 100_000_000, MAX_UNITS_PER_LINE + 1] {
            let result = service.open_order(open(3, &[("LOMO", quantity)])).await;
            let err = result.unwrap_err();
            assert!(matches!(err, DomainError::InvalidQuantity { quantity: q, .. } if q == quantity));
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }

        assert_eq!(service.store().order_count().await, 0);
        assert_eq!(table_status(&service, 3).await, TableStatus::Free);
    }

    #[tokio::test]
    async fn empty_order_is_rejected() {
        let service = create_service();
        let result = service.open_order(open(3, &[])).await;
        assert!(matches!(result, Err(DomainError::NoItems)));
    }

    #[tokio::test]
    async fn failed_commit_rolls_back_everything() {
        let service = create_service();
        service.store().set_fail_on_commit(true).await;

        let result = service.open_order(open(3, &[("LOMO", 2)])).await;

        assert!(matches!(
            result,
            Err(DomainError::Store(StoreError::Injected(_)))
        ));
        assert_eq!(service.store().order_count().await, 0);
        assert_eq!(table_status(&service, 3).await, TableStatus::Free);
    }
}

mod concurrency {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn only_one_of_two_racing_orders_gets_the_table() {
        let service = Arc::new(create_service());

        let a = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.open_order(open(1, &[("LOMO", 1)])).await }
        });
        let b = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.open_order(open(1, &[("PISCO", 1)])).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        let opened = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(opened, 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, DomainError::TableOccupied(_)))
        );
        assert_eq!(service.store().order_count().await, 1);
    }

    #[tokio::test]
    async fn stale_billing_is_rejected() {
        let service = create_service();
        let cashier = EmployeeId::new();
        let order = service.open_order(open(2, &[("CAUSA", 1)])).await.unwrap();
        service
            .bulk_advance(cashier, BulkAdvance::new(order.id, Status::Finalized))
            .await
            .unwrap();

        service
            .bill_table(cashier, BillTable::new(TableNumber::new(2)))
            .await
            .unwrap();

        // Replaying the same status change against the billed order conflicts
        let replay = service
            .store()
            .commit(ChangeSet::new().with(Change::UpdateOrderStatus {
                order_id: order.id,
                expected: Status::Finalized,
                status: Status::Invoiced,
                finished_at: None,
            }))
            .await;
        assert!(matches!(replay, Err(StoreError::Conflict { .. })));
        assert_eq!(service.invoices().await.unwrap().len(), 1);
    }
}

mod billing {
    use super::*;

    #[tokio::test]
    async fn product_removed_from_menu_bills_at_zero() {
        let service = create_service();
        let cashier = EmployeeId::new();
        let order = service
            .open_order(open(1, &[("PISCO", 1), ("LOMO", 1)]))
            .await
            .unwrap();
        service
            .bulk_advance(cashier, BulkAdvance::new(order.id, Status::Finalized))
            .await
            .unwrap();

        service.store().remove_product(&ProductId::new("PISCO")).await;

        let invoice = service
            .bill_table(cashier, BillTable::new(TableNumber::new(1)))
            .await
            .unwrap();
        assert_eq!(invoice.lines[0].unit_price, Money::zero());
        assert_eq!(invoice.total, Money::from_cents(3890));
    }

    #[tokio::test]
    async fn daily_summary_totals_invoices() {
        let service = create_service();
        let cashier = EmployeeId::new();

        for (table, product) in [(1, "CAUSA"), (2, "LOMO")] {
            let order: Order = service
                .open_order(open(table, &[(product, 1)]))
                .await
                .unwrap();
            service
                .bulk_advance(cashier, BulkAdvance::new(order.id, Status::Finalized))
                .await
                .unwrap();
            service
                .bill_table(cashier, BillTable::new(TableNumber::new(table)))
                .await
                .unwrap();
        }

        let days = service.daily_summary().await.unwrap();
        let total: Money = days.iter().map(|day| day.total).sum();
        let rows: usize = days.iter().map(|day| day.invoices.len()).sum();
        assert_eq!(rows, 2);
        assert_eq!(total, Money::from_cents(1000 + 3890));
    }

    #[tokio::test]
    async fn table_can_be_reused_after_billing() {
        let service = create_service();
        let cashier = EmployeeId::new();

        for _ in 0..2 {
            let order = service.open_order(open(4, &[("CAUSA", 1)])).await.unwrap();
            service
                .bulk_advance(cashier, BulkAdvance::new(order.id, Status::Finalized))
                .await
                .unwrap();
            service
                .bill_table(cashier, BillTable::new(TableNumber::new(4)))
                .await
                .unwrap();
        }

        assert_eq!(service.invoices().await.unwrap().len(), 2);
        assert_eq!(table_status(&service, 4).await, TableStatus::Free);
        assert_occupancy_consistent(&service).await;
    }
}

mod strict_policy {
    use super::*;

    fn strict_service() -> RestaurantService<InMemoryStore> {
        RestaurantService::with_config(
            catalog(),
            ServiceConfig {
                transition_policy: TransitionPolicy::Strict,
            },
        )
    }

    #[tokio::test]
    async fn no_op_transition_is_an_error() {
        let service = strict_service();
        let cook = EmployeeId::new();
        let order = service.open_order(open(1, &[("LOMO", 1)])).await.unwrap();

        service
            .bulk_advance(cook, BulkAdvance::new(order.id, Status::Delivered))
            .await
            .unwrap();
        let result = service
            .bulk_advance(cook, BulkAdvance::new(order.id, Status::InPreparation))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                current: Status::Delivered,
                target: Status::InPreparation,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::ConflictingState);
    }

    #[tokio::test]
    async fn forward_transitions_still_work() {
        let service = strict_service();
        let cook = EmployeeId::new();
        let order = service.open_order(open(1, &[("LOMO", 1)])).await.unwrap();

        let outcome = service
            .advance_item(cook, AdvanceItem::new(order.items[0].id, Status::InPreparation))
            .await
            .unwrap();
        assert_eq!(outcome.progress, OrderProgress::Promoted(Status::InPreparation));
    }
}
