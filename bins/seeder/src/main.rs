//! Database seeder for Lessonbook development and testing.
//!
//! Seeds a campus, two teachers, a few customers, the package catalog and
//! one paid contract per customer so the API has something to show.
//!
//! Usage: cargo run --bin seeder

use chrono::Utc;
use lessonbook_core::ledger::{CreateContractInput, PaymentInput, PaymentMethod};
use lessonbook_core::sequence::business_date;
use lessonbook_db::repositories::{NewCustomer, NewLocation, NewPackage, NewTeacher};
use lessonbook_db::{CatalogRepository, ContractRepository, LedgerContext};
use lessonbook_shared::AppConfig;
use lessonbook_shared::types::{Money, OperatorId, PackageId};
use rust_decimal::Decimal;

/// (name, lessons, price, validity days)
const PACKAGES: [(&str, u32, i64, u32); 3] = [
    ("Starter 12", 12, 1_440, 90),
    ("Standard 48", 48, 4_800, 365),
    ("Intensive 96", 96, 8_640, 365),
];

const CUSTOMERS: [(&str, &str); 3] = [
    ("Lin Wei", "13800000001"),
    ("Zhang Min", "13800000002"),
    ("Chen Jie", "13800000003"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    let ctx = LedgerContext::from_config(&config)?;

    println!("Connecting to database...");
    let db = lessonbook_db::connect(&config.database.url).await?;
    let catalog = CatalogRepository::new(db.clone());

    println!("Seeding location...");
    let location = catalog
        .create_location(NewLocation {
            name: "Downtown Campus".to_string(),
            active: true,
        })
        .await?;
    println!("  Created location: {} ({})", location.name, location.id);

    println!("Seeding teachers...");
    for name in ["Ms. Huang", "Mr. Park"] {
        let teacher = catalog
            .create_teacher(NewTeacher {
                name: name.to_string(),
                active: true,
            })
            .await?;
        println!("  Created teacher: {} ({})", teacher.name, teacher.id);
    }

    println!("Seeding packages...");
    let mut packages: Vec<(PackageId, Money)> = Vec::with_capacity(PACKAGES.len());
    for (name, total_lessons, price, validity_days) in PACKAGES {
        let total_price = Money::new(Decimal::from(price));
        let package = catalog
            .create_package(NewPackage {
                name: name.to_string(),
                total_lessons,
                total_price,
                validity_days,
                on_sale: true,
            })
            .await?;
        packages.push((package.id, total_price));
    }
    println!("  Inserted {} packages", packages.len());

    println!("Seeding customers and contracts...");
    let contracts = ContractRepository::new(db.clone(), ctx.clone());
    let operator = OperatorId::new();
    let today = business_date(Utc::now(), ctx.timezone);

    for ((name, phone), (package_id, price)) in CUSTOMERS.into_iter().zip(packages) {
        let customer = catalog
            .create_customer(NewCustomer {
                name: name.to_string(),
                phone: Some(phone.to_string()),
            })
            .await?;

        let detail = contracts
            .create(CreateContractInput {
                customer_id: customer.id,
                package_id,
                location_id: location.id,
                discount: Money::ZERO,
                start_date: today,
                initial_payment: Some(PaymentInput {
                    amount: price,
                    method: PaymentMethod::Card,
                    payment_type: None,
                }),
                operator,
            })
            .await?;
        println!(
            "  Signed {} for {}",
            detail.contract.contract_no, customer.name
        );
    }

    println!("Seeding complete!");
    Ok(())
}
