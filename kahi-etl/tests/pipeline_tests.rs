//! End-to-end pipeline tests over a temporary store
//!
//! Raw records are staged the way `kahi-etl stage` does, then processed
//! through the full normalize → merge → link → persist path.

mod helpers;

use helpers::fixtures::with_venue;
use helpers::{canonical_record, create_test_db, doaj_journal, stage, FailingRegistry, MapOpenAccessRegistry, TablePipelineBuilder};
use kahi_etl::db::{self, Collection};
use kahi_etl::merge::UnmatchedAuthorPolicy;
use kahi_etl::normalizer::doaj::parse_journal;
use kahi_etl::types::{Author, Institution, Provider, Venue, Work, WorkIdentifier};
use kahi_etl::{ProcessError, SkipReason};
use serde_json::json;
use std::sync::Arc;

const ORCID: &str = "0000-1";

#[tokio::test]
async fn test_providers_merge_into_one_author() {
    let (_dir, pool) = create_test_db().await.unwrap();
    stage(
        &pool,
        Provider::Lens,
        &canonical_record(Some("10.1/graphs"), "Graph Theory", 2010, &[("A. Turing", None)], None),
    )
    .await;
    stage(
        &pool,
        Provider::Scopus,
        &canonical_record(
            Some("10.1/GRAPHS"),
            "Graph Theory",
            2010,
            &[("Alan Turing", Some(ORCID))],
            None,
        ),
    )
    .await;

    let pipeline = TablePipelineBuilder::new(&pool).build().await;
    let id = pipeline.process(&WorkIdentifier::doi("10.1/graphs")).await.unwrap();

    let work: Work = db::load(&pool, id).await.unwrap().unwrap();
    assert_eq!(work.authors.len(), 1);
    assert_eq!(work.year_published, Some(2010));
    assert_eq!(db::count(&pool, Collection::Authors).await.unwrap(), 1);

    let author: Author = db::load(&pool, work.authors[0].author_id).await.unwrap().unwrap();
    assert!(author.external_ids.iter().any(|id| id.source == "orcid" && id.value == ORCID));
    assert!(author.aliases.contains("A. Turing"));
    assert!(author.aliases.contains("Alan Turing"));
}

#[tokio::test]
async fn test_stored_doi_is_skipped() {
    let (_dir, pool) = create_test_db().await.unwrap();
    stage(
        &pool,
        Provider::Lens,
        &canonical_record(Some("10.1/once"), "Stored Once", 2001, &[("Ana Gómez", None)], None),
    )
    .await;

    let pipeline = TablePipelineBuilder::new(&pool).build().await;
    let id = pipeline.process(&WorkIdentifier::doi("10.1/once")).await.unwrap();

    match pipeline.process(&WorkIdentifier::doi("https://doi.org/10.1/ONCE")).await {
        Err(ProcessError::Skipped(SkipReason::AlreadyPresent { id: existing })) => assert_eq!(existing, id),
        other => panic!("expected already-present skip, got {:?}", other),
    }
    assert_eq!(db::count(&pool, Collection::Documents).await.unwrap(), 1);
}

#[tokio::test]
async fn test_malformed_fragment_is_ignored() {
    let (_dir, pool) = create_test_db().await.unwrap();
    stage(
        &pool,
        Provider::Lens,
        &canonical_record(Some("10.1/partial"), "Partial Data", 2012, &[("Ana Gómez", None)], None),
    )
    .await;
    stage(
        &pool,
        Provider::Scopus,
        &json!({"document": {
            "year_published": "two thousand",
            "external_ids": [{"source": "doi", "value": "10.1/partial"}]
        }}),
    )
    .await;

    let pipeline = TablePipelineBuilder::new(&pool).build().await;
    let id = pipeline.process(&WorkIdentifier::doi("10.1/partial")).await.unwrap();

    let work: Work = db::load(&pool, id).await.unwrap().unwrap();
    assert_eq!(work.year_published, Some(2012));
    assert!(work.source_checked.iter().all(|s| s.source != Provider::Scopus));
}

#[tokio::test]
async fn test_identifiers_without_data() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let pipeline = TablePipelineBuilder::new(&pool).build().await;

    assert!(matches!(
        pipeline.process(&WorkIdentifier::doi("10.1/nowhere")).await,
        Err(ProcessError::Skipped(SkipReason::NoProviderData))
    ));
    assert!(matches!(
        pipeline.process(&WorkIdentifier::doi("  ")).await,
        Err(ProcessError::Skipped(SkipReason::InvalidIdentifier))
    ));
    assert!(matches!(
        pipeline
            .process(&WorkIdentifier::Citation {
                title: String::new(),
                venue: None,
                year: None
            })
            .await,
        Err(ProcessError::Skipped(SkipReason::InvalidIdentifier))
    ));
    assert_eq!(db::count(&pool, Collection::Documents).await.unwrap(), 0);
}

#[tokio::test]
async fn test_venue_enriched_from_open_access_registry() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let record = with_venue(
        canonical_record(Some("10.1/oa"), "Open Science in Colombia", 2019, &[("Ana Gómez", None)], None),
        "Iatreia",
        "0121-0793",
        None,
    );
    stage(&pool, Provider::Lens, &record).await;

    let journal = parse_journal(&doaj_journal("Iatreia", "0121-0793", 100.0, "EUR")).unwrap();
    let oa = MapOpenAccessRegistry::default().with("0121-0793", journal);
    let pipeline = TablePipelineBuilder::new(&pool)
        .open_access(Arc::new(oa))
        .usd_rates(&[("EUR", 1.1)])
        .build()
        .await;

    let id = pipeline.process(&WorkIdentifier::doi("10.1/oa")).await.unwrap();
    let work: Work = db::load(&pool, id).await.unwrap().unwrap();
    let venue: Venue = db::load(&pool, work.venue_id.unwrap()).await.unwrap().unwrap();

    assert_eq!(venue.country.as_deref(), Some("CO"));
    assert_eq!(venue.publisher.as_deref(), Some("Universidad de Antioquia"));
    assert_eq!(venue.apc_charges, Some(100.0));
    assert_eq!(venue.apc_currency.as_deref(), Some("EUR"));
    assert!((venue.apc_charges_usd.unwrap() - 110.0).abs() < 1e-9);
    assert!(venue.subjects.iter().any(|s| s == "Medicine"));
    assert!(venue.source_checked.iter().any(|s| s.source == Provider::Doaj));
}

#[tokio::test]
async fn test_works_share_institution_and_author() {
    let (_dir, pool) = create_test_db().await.unwrap();
    for (doi, title) in [("10.1/first", "Malaria in Urabá"), ("10.1/second", "Dengue in Medellín")] {
        stage(
            &pool,
            Provider::Lens,
            &canonical_record(Some(doi), title, 2020, &[("Ana Gómez", None)], Some("Universidad de Antioquia")),
        )
        .await;
    }

    let pipeline = TablePipelineBuilder::new(&pool).build().await;
    let first = pipeline.process(&WorkIdentifier::doi("10.1/first")).await.unwrap();
    let second = pipeline.process(&WorkIdentifier::doi("10.1/second")).await.unwrap();
    assert_ne!(first, second);

    assert_eq!(db::count(&pool, Collection::Institutions).await.unwrap(), 1);
    assert_eq!(db::count(&pool, Collection::Authors).await.unwrap(), 1);

    let a: Work = db::load(&pool, first).await.unwrap().unwrap();
    let b: Work = db::load(&pool, second).await.unwrap().unwrap();
    assert_eq!(a.authors[0].author_id, b.authors[0].author_id);
    assert_eq!(a.authors[0].affiliations, b.authors[0].affiliations);

    let institution: Institution = db::load(&pool, a.authors[0].affiliations[0]).await.unwrap().unwrap();
    assert_eq!(institution.name, "Universidad de Antioquia");
}

#[tokio::test]
async fn test_registry_outage_still_links_affiliation() {
    let (_dir, pool) = create_test_db().await.unwrap();
    stage(
        &pool,
        Provider::Lens,
        &canonical_record(
            Some("10.1/outage"),
            "Registry Outage",
            2021,
            &[("Ana Gómez", None)],
            Some("Universidad Nacional de Colombia"),
        ),
    )
    .await;

    let pipeline = TablePipelineBuilder::new(&pool)
        .registry(Arc::new(FailingRegistry))
        .build()
        .await;
    let id = pipeline.process(&WorkIdentifier::doi("10.1/outage")).await.unwrap();

    let work: Work = db::load(&pool, id).await.unwrap().unwrap();
    assert_eq!(work.authors[0].affiliations.len(), 1);
    assert_eq!(db::count(&pool, Collection::Institutions).await.unwrap(), 1);
}

#[tokio::test]
async fn test_unmatched_author_policy() {
    for (policy, expected) in [(UnmatchedAuthorPolicy::Exclude, 1), (UnmatchedAuthorPolicy::Append, 2)] {
        let (_dir, pool) = create_test_db().await.unwrap();
        stage(
            &pool,
            Provider::Lens,
            &canonical_record(Some("10.1/team"), "Team Work", 2018, &[("Alan Turing", None)], None),
        )
        .await;
        stage(
            &pool,
            Provider::Scopus,
            &canonical_record(
                Some("10.1/team"),
                "Team Work",
                2018,
                &[("Alan Turing", None), ("Grace Hopper", None)],
                None,
            ),
        )
        .await;

        let pipeline = TablePipelineBuilder::new(&pool).unmatched_authors(policy).build().await;
        let id = pipeline.process(&WorkIdentifier::doi("10.1/team")).await.unwrap();
        let work: Work = db::load(&pool, id).await.unwrap().unwrap();
        assert_eq!(work.authors.len(), expected, "policy {}", policy);
    }
}

#[tokio::test]
async fn test_citation_resolves_staged_record_without_doi() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let record = with_venue(
        canonical_record(None, "Hidrología del Valle de Aburrá", 2015, &[("Ana Gómez", None)], None),
        "Revista EIA",
        "1794-1237",
        None,
    );
    stage(&pool, Provider::Scielo, &record).await;

    let pipeline = TablePipelineBuilder::new(&pool).build().await;
    let citation = WorkIdentifier::Citation {
        title: "Hidrología del Valle de Aburrá".to_string(),
        venue: Some("Revista EIA".to_string()),
        year: Some(2015),
    };
    let id = pipeline.process(&citation).await.unwrap();

    let work: Work = db::load(&pool, id).await.unwrap().unwrap();
    assert!(work.venue_id.is_some());
    assert_eq!(work.authors.len(), 1);

    let other = WorkIdentifier::Citation {
        title: "Sedimentos en el río Cauca".to_string(),
        venue: Some("Revista EIA".to_string()),
        year: Some(2015),
    };
    assert!(matches!(
        pipeline.process(&other).await,
        Err(ProcessError::Skipped(SkipReason::NoProviderData))
    ));
}

#[tokio::test]
async fn test_citation_processed_once_across_runs() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let record = with_venue(
        canonical_record(None, "Hidrología del Valle de Aburrá", 2015, &[("Ana Gómez", None)], None),
        "Revista EIA",
        "1794-1237",
        None,
    );
    stage(&pool, Provider::Scielo, &record).await;

    let citation = WorkIdentifier::Citation {
        title: "Hidrología del Valle de Aburrá".to_string(),
        venue: Some("Revista EIA".to_string()),
        year: Some(2015),
    };
    let id = TablePipelineBuilder::new(&pool).build().await.process(&citation).await.unwrap();

    // a later run sees the same citation with different casing and accents
    let rerun = TablePipelineBuilder::new(&pool).build().await;
    let again = WorkIdentifier::Citation {
        title: "HIDROLOGIA DEL VALLE DE ABURRA".to_string(),
        venue: Some("Revista  EIA".to_string()),
        year: Some(2015),
    };
    match rerun.process(&again).await {
        Err(ProcessError::Skipped(SkipReason::AlreadyPresent { id: existing })) => assert_eq!(existing, id),
        other => panic!("expected already-present skip, got {:?}", other),
    }
    assert_eq!(db::count(&pool, Collection::Documents).await.unwrap(), 1);

    let work: Work = db::load(&pool, id).await.unwrap().unwrap();
    assert!(work.external_ids.iter().any(|e| e.source == "citation"));
}

#[tokio::test]
async fn test_work_linked_through_shared_id_is_skipped() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let mut lens = canonical_record(Some("10.1/a"), "Shared Scopus Id", 2016, &[("Ana Gómez", None)], None);
    lens["document"]["external_ids"] = json!([
        {"source": "doi", "value": "10.1/a"},
        {"source": "scopus", "value": "2-s2.0-1"}
    ]);
    let mut scopus = canonical_record(Some("10.1/b"), "Shared Scopus Id", 2016, &[("Ana Gómez", None)], None);
    scopus["document"]["external_ids"] = json!([
        {"source": "doi", "value": "10.1/b"},
        {"source": "scopus", "value": "2-s2.0-1"}
    ]);
    stage(&pool, Provider::Lens, &lens).await;
    stage(&pool, Provider::Scopus, &scopus).await;

    let pipeline = TablePipelineBuilder::new(&pool).build().await;
    let id = pipeline.process(&WorkIdentifier::doi("10.1/a")).await.unwrap();

    match pipeline.process(&WorkIdentifier::doi("10.1/b")).await {
        Err(ProcessError::Skipped(SkipReason::AlreadyPresent { id: existing })) => assert_eq!(existing, id),
        other => panic!("expected already-present skip, got {:?}", other),
    }
    assert_eq!(db::count(&pool, Collection::Documents).await.unwrap(), 1);
}
