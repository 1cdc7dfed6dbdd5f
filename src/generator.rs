// Banking Workshop - Random transaction generator
//
// Feeds the stream with plausible card activity so the processor has something to chew on.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::transaction::Transaction;

/// A spending category with the merchants that sell in it and a typical amount range
pub struct CategoryProfile {
    pub name: &'static str,
    pub merchants: &'static [&'static str],
    pub min_amount: f64,
    pub max_amount: f64,
}

pub const CATEGORIES: &[CategoryProfile] = &[
    CategoryProfile {
        name: "groceries",
        merchants: &["Whole Foods", "Trader Joe's", "Safeway", "Kroger", "Costco"],
        min_amount: 8.0,
        max_amount: 220.0,
    },
    CategoryProfile {
        name: "dining",
        merchants: &["Chipotle", "Olive Garden", "Shake Shack", "Panera Bread", "Sweetgreen"],
        min_amount: 9.0,
        max_amount: 140.0,
    },
    CategoryProfile {
        name: "coffee",
        merchants: &["Starbucks", "Blue Bottle", "Peet's Coffee", "Dunkin'"],
        min_amount: 3.0,
        max_amount: 18.0,
    },
    CategoryProfile {
        name: "travel",
        merchants: &["Delta Air Lines", "United Airlines", "Marriott", "Hilton", "Airbnb"],
        min_amount: 90.0,
        max_amount: 1_400.0,
    },
    CategoryProfile {
        name: "transportation",
        merchants: &["Uber", "Lyft", "Shell", "Chevron", "BART"],
        min_amount: 4.0,
        max_amount: 95.0,
    },
    CategoryProfile {
        name: "entertainment",
        merchants: &["Netflix", "Spotify", "AMC Theatres", "Ticketmaster", "Steam"],
        min_amount: 6.0,
        max_amount: 250.0,
    },
    CategoryProfile {
        name: "shopping",
        merchants: &["Amazon", "Target", "Best Buy", "IKEA", "REI"],
        min_amount: 12.0,
        max_amount: 600.0,
    },
    CategoryProfile {
        name: "utilities",
        merchants: &["PG&E", "Comcast", "Verizon", "AT&T"],
        min_amount: 40.0,
        max_amount: 320.0,
    },
];

const LOCATIONS: &[&str] = &[
    "San Francisco, CA",
    "New York, NY",
    "Austin, TX",
    "Seattle, WA",
    "Miami, FL",
    "Orlando, FL",
    "Chicago, IL",
    "Denver, CO",
    "Boston, MA",
];

const CUSTOMER_COUNT: u32 = 50;

/// One random transaction stamped with the current time
pub fn generate_random_transaction<R: Rng>(rng: &mut R) -> Transaction {
    let profile = &CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
    let merchant = profile.merchants.choose(rng).copied().unwrap_or("Unknown");
    let location = LOCATIONS.choose(rng).copied().unwrap_or("Unknown");

    let raw_amount = rng.gen_range(profile.min_amount..=profile.max_amount);
    let amount = (raw_amount * 100.0).round() / 100.0;

    Transaction {
        transaction_id: format!("TXN-{}", uuid::Uuid::new_v4().simple()).to_uppercase(),
        customer_id: Some(format!("CUST-{:04}", rng.gen_range(1..=CUSTOMER_COUNT))),
        amount,
        merchant: Some(merchant.to_string()),
        category: Some(profile.name.to_string()),
        timestamp: Utc::now().timestamp_millis(),
        location: Some(location.to_string()),
        card_last4: Some(format!("{:04}", rng.gen_range(0..10_000))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_transactions_follow_catalogue() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let tx = generate_random_transaction(&mut rng);

            let category = tx.category.as_deref().unwrap();
            let profile = CATEGORIES.iter().find(|p| p.name == category).unwrap();

            assert!(profile.merchants.contains(&tx.merchant.as_deref().unwrap()));
            assert!(tx.amount >= profile.min_amount && tx.amount <= profile.max_amount);
            assert_eq!(tx.card_last4.as_ref().unwrap().len(), 4);
            assert!(tx.customer_id.as_ref().unwrap().starts_with("CUST-"));
            assert!(tx.timestamp > 0);
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = generate_random_transaction(&mut rng);
        let b = generate_random_transaction(&mut rng);

        assert_ne!(a.transaction_id, b.transaction_id);
        assert!(a.transaction_id.starts_with("TXN-"));
    }

    #[test]
    fn test_catalogue_ranges_are_sane() {
        for profile in CATEGORIES {
            assert!(profile.min_amount > 0.0);
            assert!(profile.min_amount < profile.max_amount);
            assert!(!profile.merchants.is_empty());
        }
    }
}
