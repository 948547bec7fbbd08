//! Synthetic dataset generation.
//!
//! Produces the six base collections with internally consistent foreign
//! keys. Content is randomized (unseeded thread RNG); only the shape is
//! deterministic, so tests assert structural invariants rather than
//! values.

use chrono::{Duration, Utc};
use fake::faker::address::en::{BuildingNumber, CityName, CountryName, StreetName, ZipCode};
use fake::faker::company::en::{CatchPhrase, Industry};
use fake::faker::internet::en::FreeEmail;
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::Rng;
use stagedb::DocId;

use crate::model::{
    Customer, Dataset, Order, OrderItem, PaymentMethod, PaymentStatus, PaymentTransaction, Product,
    ShippingAddress,
};

const PAYMENT_STATUSES: [PaymentStatus; 3] = [
    PaymentStatus::Pending,
    PaymentStatus::Completed,
    PaymentStatus::Failed,
];

const PAYMENT_METHODS: [PaymentMethod; 3] = [
    PaymentMethod::CreditCard,
    PaymentMethod::Paypal,
    PaymentMethod::BankTransfer,
];

/// Generates a dataset with `n` of each base entity and `n` orders.
pub fn generate_dataset(n: usize) -> Dataset {
    generate(n, n)
}

/// Generates `base_count` customers, products, addresses, and payments,
/// plus `order_count` orders each fanning out to 1-5 items.
///
/// Order foreign keys are sampled uniformly with replacement from the
/// generated pools, so fan-in is unbounded: an entity may be referenced
/// by zero or many orders. Each item copies the sampled product's price
/// as its `unit_price`. With empty base pools no orders are generated.
pub fn generate(base_count: usize, order_count: usize) -> Dataset {
    let mut rng = rand::thread_rng();

    let customers: Vec<Customer> = (0..base_count)
        .map(|_| Customer {
            id: DocId::new(),
            name: Name().fake(),
            email: FreeEmail().fake(),
            phone: PhoneNumber().fake(),
        })
        .collect();

    let products: Vec<Product> = (0..base_count)
        .map(|_| Product {
            id: DocId::new(),
            name: CatchPhrase().fake(),
            price: random_price(&mut rng),
            category: Industry().fake(),
        })
        .collect();

    let shipping_addresses: Vec<ShippingAddress> = (0..base_count)
        .map(|_| {
            let number: String = BuildingNumber().fake();
            let street: String = StreetName().fake();
            ShippingAddress {
                id: DocId::new(),
                street: format!("{} {}", number, street),
                city: CityName().fake(),
                country: CountryName().fake(),
                postal_code: ZipCode().fake(),
            }
        })
        .collect();

    let payment_transactions: Vec<PaymentTransaction> = (0..base_count)
        .map(|_| PaymentTransaction {
            id: DocId::new(),
            status: PAYMENT_STATUSES[rng.gen_range(0..PAYMENT_STATUSES.len())],
            amount: random_price(&mut rng),
            method: PAYMENT_METHODS[rng.gen_range(0..PAYMENT_METHODS.len())],
            timestamp: recent_timestamp(&mut rng),
        })
        .collect();

    let mut orders = Vec::with_capacity(order_count);
    let mut order_items = Vec::new();
    if base_count > 0 {
        for _ in 0..order_count {
            let customer = &customers[rng.gen_range(0..customers.len())];
            let shipping = &shipping_addresses[rng.gen_range(0..shipping_addresses.len())];
            let payment = &payment_transactions[rng.gen_range(0..payment_transactions.len())];
            let order_id = DocId::new();

            orders.push(Order {
                id: order_id,
                customer_id: customer.id,
                shipping_address_id: shipping.id,
                payment_transaction_id: payment.id,
                order_date: recent_timestamp(&mut rng),
            });

            let item_count = rng.gen_range(1..=5);
            for _ in 0..item_count {
                let product = &products[rng.gen_range(0..products.len())];
                order_items.push(OrderItem {
                    id: DocId::new(),
                    order_id,
                    product_id: product.id,
                    quantity: rng.gen_range(1..=10),
                    unit_price: product.price,
                });
            }
        }
    }

    Dataset {
        customers,
        products,
        shipping_addresses,
        payment_transactions,
        orders,
        order_items,
    }
}

/// A price in [1.00, 1000.00), rounded to cents.
fn random_price<R: Rng>(rng: &mut R) -> f64 {
    (rng.gen_range(1.0_f64..1000.0) * 100.0).round() / 100.0
}

/// A timestamp within the last 30 days.
fn recent_timestamp<R: Rng>(rng: &mut R) -> chrono::DateTime<Utc> {
    Utc::now() - Duration::seconds(rng.gen_range(0..60 * 60 * 24 * 30))
}
