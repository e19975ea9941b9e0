//! End-to-end run over the fixture trip files: three taxi types, two ghosts,
//! one surcharge leak, one speed-excluded short trip.

use congestion_audit::aggregate::{monthly_kpis, top_leakage_zones, velocity_heatmap, zone_kpis};
use congestion_audit::config::PipelineConfig;
use congestion_audit::congestion::enrich_trips;
use congestion_audit::dashboard::{leakage_view, load_kpi_rows, monthly_trend, zone_activity};
use congestion_audit::ghost::filter_ghost_trips;
use congestion_audit::output::write_table;
use congestion_audit::schema::unify_sources;
use congestion_audit::sources::read_all_sources;

const FIXTURE_DIR: &str = "tests/fixtures";

#[test]
fn test_full_pipeline() {
    let config = PipelineConfig::default();

    let sources = read_all_sources(FIXTURE_DIR).expect("fixtures should load");
    let input_rows: usize = sources.iter().map(|s| s.table.len()).sum();

    // Unifier drops nothing
    let unified = unify_sources(sources);
    assert_eq!(unified.len(), input_rows);
    assert_eq!(unified.len(), 8);

    // Two ghosts: the zero-distance $15 yellow trip, the negative-duration
    // green trip
    let (clean, audit) = filter_ghost_trips(unified, &config);
    assert_eq!(audit.removed, 2);
    assert_eq!(audit.zero_distance_fare, 1);
    assert_eq!(audit.non_positive_duration, 1);
    assert_eq!(clean.len(), 6);

    // Enrichment preserves row count; one leak, one speed-excluded trip
    let enriched = enrich_trips(clean, &config);
    assert_eq!(enriched.len(), 6);
    assert_eq!(enriched.iter().filter(|t| t.surcharge_leak).count(), 1);
    assert_eq!(
        enriched.iter().filter(|t| t.avg_speed_mph.is_none()).count(),
        1
    );
    for trip in &enriched {
        if let Some(speed) = trip.avg_speed_mph {
            assert!(speed >= 0.0 && speed.is_finite());
        }
    }

    // Monthly KPIs: Jan + Feb, trip counts conserve the surviving rows
    let monthly = monthly_kpis(&enriched);
    assert_eq!(monthly.len(), 2);
    let total: usize = monthly.iter().map(|r| r.trip_count).sum();
    assert_eq!(total, enriched.len());

    let jan = &monthly[0];
    assert_eq!(jan.trip_count, 4);
    assert_eq!(jan.leak_count, 1);
    assert!((jan.leak_rate - 0.25).abs() < 1e-9);
    assert_eq!(jan.trip_count - jan.leak_count, 3);

    // Feb: revenue includes the speed-excluded trip, speed mean does not
    let feb = &monthly[1];
    assert_eq!(feb.trip_count, 2);
    assert!((feb.total_revenue - 38.5).abs() < 1e-9);
    assert!((feb.avg_speed_mph.unwrap() - 7.5).abs() < 1e-9);

    for row in &monthly {
        assert!(row.leak_rate >= 0.0 && row.leak_rate <= 1.0);
    }
}

#[test]
fn test_zone_kpis_and_leakage_ranking() {
    let config = PipelineConfig::default();
    let sources = read_all_sources(FIXTURE_DIR).unwrap();
    let (clean, _) = filter_ghost_trips(unify_sources(sources), &config);
    let enriched = enrich_trips(clean, &config);

    let zones = zone_kpis(&enriched);
    let total: usize = zones.iter().map(|r| r.trip_count).sum();
    assert_eq!(total, enriched.len());

    // Zone 161 (Midtown Center) carries the only leak
    let top = top_leakage_zones(&zones, 3);
    assert_eq!(top[0].zone, 161);
    assert_eq!(top[0].leak_count, 1);

    // Heatmap only covers congestion-zone pickups with a defined speed:
    // two Midtown yellow trips plus the long FHV trip; the 30-second FHV
    // trip and all out-of-zone pickups are absent
    let heatmap = velocity_heatmap(&enriched);
    assert_eq!(heatmap.len(), 3);
    let cell_trips: usize = heatmap.iter().map(|c| c.trip_count).sum();
    assert_eq!(cell_trips, 3);
}

#[test]
fn test_kpi_csv_round_trip_and_views() {
    let config = PipelineConfig::default();
    let sources = read_all_sources(FIXTURE_DIR).unwrap();
    let (clean, _) = filter_ghost_trips(unify_sources(sources), &config);
    let enriched = enrich_trips(clean, &config);

    let monthly = monthly_kpis(&enriched);
    let zones = zone_kpis(&enriched);

    let dir = std::env::temp_dir().join("congestion_audit_it_round_trip");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let monthly_path = dir.join("monthly_kpis.csv");
    write_table(monthly_path.to_str().unwrap(), &monthly).unwrap();
    let reloaded = load_kpi_rows(monthly_path.to_str().unwrap()).unwrap();
    assert_eq!(reloaded.len(), monthly.len());
    assert_eq!(reloaded[0].trip_count, monthly[0].trip_count);
    assert_eq!(reloaded[0].month, monthly[0].month);
    assert_eq!(
        reloaded.iter().map(|r| r.trip_count).sum::<usize>(),
        enriched.len()
    );

    // Views are pure reshapes: row counts pass through
    assert_eq!(monthly_trend(&reloaded).len(), monthly.len());
    assert_eq!(leakage_view(&reloaded).len(), monthly.len());
    assert_eq!(zone_activity(&zones).len(), zones.len());

    std::fs::remove_dir_all(&dir).unwrap();
}
