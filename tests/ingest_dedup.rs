// tests/ingest_dedup.rs
use ai_news_digest::ingest::scrapers::fixture::FixtureScraper;
use ai_news_digest::ingest::{collect, CollectOptions, Throttle};
use ai_news_digest::SourceConfig;

fn opts() -> CollectOptions {
    CollectOptions {
        throttle: Throttle::none(),
        ..CollectOptions::default()
    }
}

#[tokio::test]
async fn same_domain_keeps_only_the_most_recent_story() {
    // a.com and a.com/blog normalize to the same domain.
    let json = r#"[
        {"source": "https://a.com", "stories": [
            {"headline": "Fresh item about planes", "link": "https://a.com/1", "date_posted": "1 hour ago"}
        ]},
        {"source": "https://a.com/blog", "stories": [
            {"headline": "Older item about trains", "link": "https://a.com/blog/2", "date_posted": "5 hours ago"}
        ]}
    ]"#;
    let scraper = FixtureScraper::from_json(json);
    let sources = vec![
        SourceConfig {
            identifier: "https://a.com".into(),
            max_items: 3,
            timeframe_hours: 24,
        },
        SourceConfig {
            identifier: "https://a.com/blog".into(),
            max_items: 3,
            timeframe_hours: 24,
        },
    ];

    let stories = collect(&scraper, &sources, &opts()).await;
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].link, "https://a.com/1");
    assert_eq!(stories[0].date_posted, "1 hour ago");
}

#[tokio::test]
async fn different_domains_both_survive() {
    let json = r#"[
        {"source": "https://a.com", "stories": [
            {"headline": "Alpha does something", "link": "https://a.com/1", "date_posted": "1 hour ago"}
        ]},
        {"source": "https://b.com", "stories": [
            {"headline": "Beta does another thing", "link": "https://b.com/1", "date_posted": "2 hours ago"}
        ]}
    ]"#;
    let scraper = FixtureScraper::from_json(json);
    let sources = vec![
        SourceConfig {
            identifier: "https://a.com".into(),
            max_items: 3,
            timeframe_hours: 24,
        },
        SourceConfig {
            identifier: "https://b.com".into(),
            max_items: 3,
            timeframe_hours: 24,
        },
    ];

    let stories = collect(&scraper, &sources, &opts()).await;
    assert_eq!(stories.len(), 2);
}

#[tokio::test]
async fn stale_items_are_filtered_per_source_window() {
    let json = r#"[
        {"source": "https://a.com", "stories": [
            {"headline": "Fresh", "link": "https://a.com/1", "date_posted": "2 hours ago"},
            {"headline": "Stale", "link": "https://a.com/2", "date_posted": "9 days ago"}
        ]}
    ]"#;
    let scraper = FixtureScraper::from_json(json);
    let sources = vec![SourceConfig {
        identifier: "https://a.com".into(),
        max_items: 5,
        timeframe_hours: 48,
    }];

    let stories = collect(&scraper, &sources, &opts()).await;
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].headline, "Fresh");
}

#[tokio::test]
async fn per_source_max_items_cap_is_enforced() {
    let json = r#"[
        {"source": "https://a.com", "stories": [
            {"headline": "One thing happened", "link": "https://a.com/1", "date_posted": "1 hour ago"},
            {"headline": "Another unrelated event", "link": "https://a.com/2", "date_posted": "2 hours ago"},
            {"headline": "A third development", "link": "https://a.com/3", "date_posted": "3 hours ago"}
        ]}
    ]"#;
    let scraper = FixtureScraper::from_json(json);
    let sources = vec![SourceConfig {
        identifier: "https://a.com".into(),
        max_items: 2,
        timeframe_hours: 24,
    }];

    let opts = CollectOptions {
        dedup_by_domain: false,
        throttle: Throttle::none(),
        ..CollectOptions::default()
    };
    let stories = collect(&scraper, &sources, &opts).await;
    assert_eq!(stories.len(), 2);
}
