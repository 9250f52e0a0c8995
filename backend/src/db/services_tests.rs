use chrono::{Duration, NaiveDate, TimeZone, Utc};

use super::*;
use crate::db::repositories::LocalRepository;

fn installation(
    id: &str,
    municipality: &str,
    lng: f64,
    lat: f64,
    tariff: Option<&str>,
) -> Installation {
    Installation {
        installation_id: id.to_string(),
        latitude: lat,
        longitude: lng,
        municipality: municipality.to_string(),
        tariff_class: tariff.map(str::to_string),
        address: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn square(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Geometry {
    Geometry::Polygon {
        coordinates: vec![vec![
            [min_lng, min_lat],
            [max_lng, min_lat],
            [max_lng, max_lat],
            [min_lng, max_lat],
            [min_lng, min_lat],
        ]],
    }
}

fn seeded_repo() -> LocalRepository {
    let repo = LocalRepository::new();
    repo.insert_municipality(MunicipalityGeometry {
        id: 1,
        name: "Natal".into(),
        geometry: square(-35.3, -5.9, -35.1, -5.7),
    })
    .unwrap();
    repo.insert_installation(installation("INST001", "Natal", -35.21, -5.79, Some("B1")))
        .unwrap();
    repo.insert_installation(installation("INST002", "Natal", -35.20, -5.80, Some("B1")))
        .unwrap();
    repo.insert_installation(installation("INST003", "Natal", -35.19, -5.81, None))
        .unwrap();
    repo.insert_installation(installation("INST100", "Mossoró", -37.34, -5.19, Some("B3")))
        .unwrap();

    repo.insert_main_query(MainQuery {
        id: MainQueryId::new(1),
        name: "Desvio de energia".into(),
        description: None,
        color: "#FF0000".into(),
        active: true,
        created_at: Utc::now(),
    })
    .unwrap();
    for (id, target) in [
        ("INST001", TargetType::Strong),
        ("INST002", TargetType::Regular),
        ("INST100", TargetType::Regular),
    ] {
        repo.insert_main_result(MainQueryResult {
            query_id: MainQueryId::new(1),
            installation_id: id.into(),
            target_type: target,
            score: Some(0.9),
        })
        .unwrap();
    }

    repo.insert_auxiliary_query(AuxiliaryQuery {
        id: AuxiliaryQueryId::new(1),
        name: "Consumo atípico".into(),
        description: None,
        return_type: ReturnType::Heatmap,
        active: true,
        created_at: Utc::now(),
    })
    .unwrap();
    for (id, intensity) in [("INST001", 0.85), ("INST003", 0.9), ("INST100", 0.4)] {
        repo.insert_auxiliary_result(AuxiliaryQueryResult {
            query_id: AuxiliaryQueryId::new(1),
            installation_id: id.into(),
            intensity: Some(intensity),
        })
        .unwrap();
    }
    repo
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_clamp_limit() {
    assert_eq!(clamp_limit(None, DEFAULT_CONSUMPTION_LIMIT), 12);
    assert_eq!(clamp_limit(Some(0), 12), 1);
    assert_eq!(clamp_limit(Some(-5), 12), 1);
    assert_eq!(clamp_limit(Some(5000), 12), MAX_LIMIT);
    assert_eq!(clamp_limit(Some(30), 12), 30);
}

#[tokio::test]
async fn test_main_results_unbounded() {
    let repo = seeded_repo();
    let results = get_main_query_results(&repo, MainQueryId::new(1), None)
        .await
        .unwrap();

    assert_eq!(results.features.len(), 3);
    assert_eq!(results.metadata.total_results, 3);
    assert_eq!(results.metadata.query_color, "#FF0000");
    let first = &results.features[0];
    assert_eq!(first.properties.installation_id, "INST001");
    assert_eq!(first.properties.target_type, TargetType::Strong);
    assert_eq!(first.geometry, Geometry::point(-35.21, -5.79));
}

#[tokio::test]
async fn test_main_results_within_bounds() {
    let repo = seeded_repo();
    let bounds = BoundingBox::new(-35.3, -5.9, -35.1, -5.7);
    let results = get_main_query_results(&repo, MainQueryId::new(1), Some(bounds))
        .await
        .unwrap();

    let ids: Vec<_> = results
        .features
        .iter()
        .map(|f| f.properties.installation_id.as_str())
        .collect();
    assert_eq!(ids, vec!["INST001", "INST002"]);
    assert_eq!(results.metadata.total_results, 2);
}

#[tokio::test]
async fn test_main_results_unknown_query() {
    let repo = seeded_repo();
    let err = get_main_query_results(&repo, MainQueryId::new(99), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_auxiliary_results_by_municipality() {
    let repo = seeded_repo();
    let area = AreaSelection::Municipality("Natal".into());
    let results = get_auxiliary_query_results(&repo, AuxiliaryQueryId::new(1), &area)
        .await
        .unwrap();

    assert_eq!(results.features.len(), 2);
    assert_eq!(results.metadata.area_type, AreaKind::Municipality);
    assert_eq!(results.metadata.return_type, ReturnType::Heatmap);
    assert!(results
        .features
        .iter()
        .all(|f| f.properties.municipality == "Natal"));
}

#[tokio::test]
async fn test_auxiliary_results_by_polygon() {
    let repo = seeded_repo();
    // Covers INST001 only.
    let polygon = AreaPolygon::from_geometry(square(-35.215, -5.795, -35.205, -5.785)).unwrap();
    let area = AreaSelection::Polygon(polygon);
    let results = get_auxiliary_query_results(&repo, AuxiliaryQueryId::new(1), &area)
        .await
        .unwrap();

    assert_eq!(results.features.len(), 1);
    assert_eq!(results.features[0].properties.intensity, Some(0.85));
    assert_eq!(results.metadata.area_type, AreaKind::Polygon);
}

#[tokio::test]
async fn test_auxiliary_results_unknown_query() {
    let repo = seeded_repo();
    let area = AreaSelection::Municipality("Natal".into());
    let err = get_auxiliary_query_results(&repo, AuxiliaryQueryId::new(7), &area)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_area_metrics_for_municipality() {
    let repo = seeded_repo();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    repo.insert_fraud(
        "INST001",
        FraudRecord {
            fraud_date: date(2023, 3, 10),
            fraud_type: Some("Ligação direta".into()),
            recovered_value: None,
            notes: None,
        },
    )
    .unwrap();
    repo.insert_fraud(
        "INST001",
        FraudRecord {
            fraud_date: date(2022, 1, 5),
            fraud_type: None,
            recovered_value: None,
            notes: None,
        },
    )
    .unwrap();
    // Outside the five-year window.
    repo.insert_fraud(
        "INST002",
        FraudRecord {
            fraud_date: date(2015, 1, 1),
            fraud_type: None,
            recovered_value: None,
            notes: None,
        },
    )
    .unwrap();

    let area = AreaSelection::Municipality("Natal".into());
    let metrics = compute_area_metrics_at(&repo, &area, now).await.unwrap();

    assert_eq!(metrics.total_installations, 3);
    assert_eq!(metrics.fraud_installations_5y, 1);
    assert!(metrics.perimeter_km.unwrap() > 80.0);
    assert_eq!(
        metrics.tariff_distribution,
        vec![
            TariffBucket {
                tariff_class: "B1".into(),
                count: 2
            },
            TariffBucket {
                tariff_class: UNCLASSIFIED_TARIFF.into(),
                count: 1
            },
        ]
    );
}

#[tokio::test]
async fn test_area_metrics_unknown_municipality() {
    let repo = seeded_repo();
    let area = AreaSelection::Municipality("Caicó".into());
    let metrics = compute_area_metrics(&repo, &area).await.unwrap();

    assert_eq!(metrics.perimeter_km, None);
    assert_eq!(metrics.total_installations, 0);
    assert_eq!(metrics.fraud_installations_5y, 0);
    assert!(metrics.tariff_distribution.is_empty());
}

#[tokio::test]
async fn test_area_metrics_for_polygon_has_perimeter() {
    let repo = seeded_repo();
    let polygon = AreaPolygon::from_geometry(square(-35.3, -5.9, -35.1, -5.7)).unwrap();
    let metrics = compute_area_metrics(&repo, &AreaSelection::Polygon(polygon))
        .await
        .unwrap();
    assert!(metrics.perimeter_km.is_some());
    assert_eq!(metrics.total_installations, 3);
}

#[tokio::test]
async fn test_consumption_is_chronological_and_limited() {
    let repo = seeded_repo();
    for month in 1..=6 {
        repo.insert_consumption(
            "INST001",
            ConsumptionRecord {
                reference_date: date(2024, month, 1),
                consumption: 100.0 + month as f64,
                demand: None,
            },
        )
        .unwrap();
    }

    let rows = get_consumption_history(&repo, "INST001", Some(3))
        .await
        .unwrap();
    let months: Vec<_> = rows.iter().map(|r| r.reference_date).collect();
    assert_eq!(months, vec![date(2024, 4, 1), date(2024, 5, 1), date(2024, 6, 1)]);

    let all = get_consumption_history(&repo, "INST001", None).await.unwrap();
    assert_eq!(all.len(), 6);
    assert!(get_consumption_history(&repo, "UNKNOWN", None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_service_notes_default_limit() {
    let repo = seeded_repo();
    for n in 0..25 {
        repo.insert_service_note(
            "INST002",
            ServiceNote {
                note_number: format!("NS{:03}", n),
                note_date: date(2024, 1, 1) + Duration::days(n),
                service_type: None,
                description: None,
                status: None,
            },
        )
        .unwrap();
    }
    let notes = get_service_notes(&repo, "INST002", None).await.unwrap();
    assert_eq!(notes.len(), DEFAULT_SERVICE_NOTES_LIMIT as usize);
    assert_eq!(notes[0].note_number, "NS024");
}

#[tokio::test]
async fn test_get_installation_not_found() {
    let repo = seeded_repo();
    assert_eq!(
        get_installation(&repo, "INST001").await.unwrap().municipality,
        "Natal"
    );
    assert!(get_installation(&repo, "NOPE").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_update_status_then_read_current() {
    let repo = seeded_repo();
    let first = update_status(
        &repo,
        NewStatus {
            installation_id: "INST001".into(),
            status: StatusValue::ToVerify,
            user: "  analyst  ".into(),
            notes: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(first.user, "analyst");

    update_status(
        &repo,
        NewStatus {
            installation_id: "INST001".into(),
            status: StatusValue::Selected,
            user: "analyst".into(),
            notes: Some("confirmado em campo".into()),
        },
    )
    .await
    .unwrap();

    let current = get_current_status(&repo, "INST001").await.unwrap();
    assert_eq!(current.status, StatusValue::Selected);
    let history = get_status_history(&repo, "INST001").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].status, StatusValue::ToVerify);
}

#[tokio::test]
async fn test_update_status_rejects_blank_user() {
    let repo = seeded_repo();
    let err = update_status(
        &repo,
        NewStatus {
            installation_id: "INST001".into(),
            status: StatusValue::Selected,
            user: "   ".into(),
            notes: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RepositoryError::ValidationError { .. }));
    assert!(get_current_status(&repo, "INST001")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_update_status_unknown_installation() {
    let repo = seeded_repo();
    let err = update_status(
        &repo,
        NewStatus {
            installation_id: "NOPE".into(),
            status: StatusValue::Selected,
            user: "analyst".into(),
            notes: None,
        },
    )
    .await
    .unwrap_err();
    assert!(err.is_not_found());
    assert!(get_status_history(&repo, "NOPE")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_municipality_feature() {
    let repo = seeded_repo();
    let feature = get_municipality_feature(&repo, "Natal").await.unwrap();
    assert_eq!(feature.properties.name, "Natal");
    assert_eq!(feature.geometry.type_name(), "Polygon");
    assert!(get_municipality_feature(&repo, "Caicó")
        .await
        .unwrap_err()
        .is_not_found());

    let names: Vec<_> = list_municipalities(&repo)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names, vec!["Natal"]);
}

#[tokio::test]
async fn test_unhealthy_repository_propagates_connection_error() {
    let repo = seeded_repo();
    repo.set_healthy(false).unwrap();
    let err = list_main_queries(&repo).await.unwrap_err();
    assert!(matches!(err, RepositoryError::ConnectionError { .. }));
    assert!(!health_check(&repo).await.unwrap());
}
