//! Manual probe against a few known venues: one availability query each for
//! tonight at 7 PM venue-local, results printed. No state, no alerts.

use chrono::{FixedOffset, NaiveTime, TimeZone, Utc};
use tablewatch::config::dinner;
use tablewatch::probe::{AvailabilityClient, SlotQuery, WiselyClient};

struct Venue {
    name: &'static str,
    merchant_id: &'static str,
    utc_offset_hours: i32,
}

const VENUES: &[Venue] = &[
    Venue {
        name: "Hillstone NYC",
        merchant_id: "278278",
        utc_offset_hours: -5,
    },
    Venue {
        name: "South Beverly Grill",
        merchant_id: "278269",
        utc_offset_hours: -8,
    },
    Venue {
        name: "East Hampton Grill",
        merchant_id: "278240",
        utc_offset_hours: -5,
    },
];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    let client = WiselyClient::from_env();

    for venue in VENUES {
        let off = FixedOffset::east_opt(venue.utc_offset_hours * 3600).unwrap();
        let tonight = Utc::now()
            .with_timezone(&off)
            .date_naive()
            .and_time(NaiveTime::from_hms_opt(19, 0, 0).unwrap());
        let at = off.from_local_datetime(&tonight).unwrap();

        println!("== {} ({}) @ {}", venue.name, venue.merchant_id, at);
        let q = SlotQuery {
            merchant_id: venue.merchant_id.to_string(),
            service: dinner(),
            party_size: 2,
            at,
        };
        match client.search(&q).await {
            Ok(slots) if slots.is_empty() => println!("   no open slots"),
            Ok(slots) => {
                for s in slots {
                    println!("   {} @ {} for {}", s.date_label, s.time_label, s.party_size);
                }
            }
            Err(e) => println!("   probe failed: {e:#}"),
        }
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    }

    println!("probe-demo done");
}
