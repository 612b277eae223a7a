//! Every ingestion request leaves the client at exactly the target size.

use chrono::NaiveDate;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use covertrace::core::capper::{exposure_count, MAX_KEYS_PER_UPLOAD};
use covertrace::core::catalog::{
    endpoints, maximal_upload_target_size, CunValidationRequest, DataUploadRequest,
    DummyIngestionRequest, OtpValidationRequest, PaddedRequest,
};
use covertrace::core::{CoreError, Cun, Otp, UploadLimits};
use covertrace::{Configuration, ServiceError};
use covertrace_testkit::{fixed_now, maximal_upload_body, UploadShape};

const TARGET: usize = 110_000;

fn otp(seed: u64) -> Otp {
    Otp::generate_with_rng(&mut StdRng::seed_from_u64(seed))
}

#[test]
fn test_maximal_upload_fits_default_target() {
    let body = maximal_upload_body(&UploadLimits::default());
    let request = DataUploadRequest::new(body, otp(1), fixed_now())
        .build(endpoints::INGESTION_BASE_URL, TARGET)
        .unwrap();
    assert_eq!(request.wire_size(), TARGET);
}

#[test]
fn test_widest_limits_need_a_larger_target() {
    // 14 keys, 100 summaries and 600 exposure infos.
    let limits = UploadLimits {
        max_summaries: 100,
        max_exposure_infos: 600,
    };
    let body = maximal_upload_body(&limits);
    assert_eq!(body.exposure_detection_summaries.len(), 100);
    assert_eq!(exposure_count(&body.exposure_detection_summaries), 600);

    let err = DataUploadRequest::new(body.clone(), otp(4), fixed_now())
        .build(endpoints::INGESTION_BASE_URL, TARGET)
        .unwrap_err();
    assert!(matches!(err, CoreError::PaddingOverflow { target_size: TARGET, required } if required > TARGET));

    let wide_target = 120_000;
    let request = DataUploadRequest::new(body, otp(4), fixed_now())
        .build(endpoints::INGESTION_BASE_URL, wide_target)
        .unwrap();
    assert_eq!(request.wire_size(), wide_target);
}

#[test]
fn test_configuration_rejects_packet_size_below_maximal_upload() {
    let configuration = Configuration {
        teks_max_summary_count: 100,
        teks_max_info_count: 600,
        teks_packet_size: TARGET,
        ..Configuration::default()
    };
    let err = configuration
        .validate(endpoints::INGESTION_BASE_URL, fixed_now())
        .unwrap_err();
    assert!(matches!(err, ServiceError::Config(_)));

    let required = maximal_upload_target_size(
        endpoints::INGESTION_BASE_URL,
        &configuration.upload_limits(),
        fixed_now(),
    )
    .unwrap();
    Configuration {
        teks_packet_size: required,
        ..configuration
    }
    .validate(endpoints::INGESTION_BASE_URL, fixed_now())
    .unwrap();
}

#[test]
fn test_undersized_target_is_rejected() {
    let err = OtpValidationRequest::new(otp(1), fixed_now())
        .build(endpoints::INGESTION_BASE_URL, 100)
        .unwrap_err();
    assert!(matches!(err, CoreError::PaddingOverflow { target_size: 100, .. }));
}

#[test]
fn test_request_kinds_share_one_size() {
    let sizes = [
        OtpValidationRequest::new(otp(2), fixed_now())
            .build(endpoints::INGESTION_BASE_URL, TARGET)
            .unwrap()
            .wire_size(),
        CunValidationRequest::new(
            Cun::parse("AEFHIJKLQ7").unwrap(),
            "12345678",
            NaiveDate::from_ymd_opt(2020, 6, 10).unwrap(),
            fixed_now(),
        )
        .build(endpoints::INGESTION_BASE_URL, TARGET)
        .unwrap()
        .wire_size(),
        DummyIngestionRequest::new()
            .build(endpoints::INGESTION_BASE_URL, TARGET)
            .unwrap()
            .wire_size(),
        DataUploadRequest::new(
            maximal_upload_body(&UploadLimits::default()),
            otp(3),
            fixed_now(),
        )
        .build(endpoints::INGESTION_BASE_URL, TARGET)
        .unwrap()
        .wire_size(),
    ];
    assert!(sizes.iter().all(|&size| size == TARGET), "{sizes:?}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_any_upload_hits_target(shape: UploadShape, seed in any::<u64>()) {
        let body = shape.body(&UploadLimits::default());
        let request = DataUploadRequest::new(body, otp(seed), fixed_now())
            .build(endpoints::INGESTION_BASE_URL, TARGET)
            .unwrap();
        prop_assert_eq!(request.wire_size(), TARGET);
    }

    #[test]
    fn test_capping_is_idempotent(shape: UploadShape) {
        let limits = UploadLimits::default();
        let once = shape.body(&limits);
        prop_assert!(once.teks.len() <= MAX_KEYS_PER_UPLOAD);
        prop_assert!(once.exposure_detection_summaries.len() <= limits.max_summaries);
        prop_assert!(exposure_count(&once.exposure_detection_summaries) <= limits.max_exposure_infos);

        let twice = UploadShape {
            teks: once.teks.clone(),
            province: once.province.clone(),
            summaries: once.exposure_detection_summaries.clone(),
            countries: once.countries_of_interest.clone(),
        }
        .body(&limits);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_tighter_limits_still_hit_target(
        shape: UploadShape,
        max_summaries in 0usize..=10,
        max_exposure_infos in 0usize..=30,
    ) {
        let limits = UploadLimits { max_summaries, max_exposure_infos };
        let body = shape.body(&limits);
        prop_assert!(body.exposure_detection_summaries.len() <= max_summaries);
        let request = DataUploadRequest::new(body, otp(0), fixed_now())
            .build(endpoints::INGESTION_BASE_URL, TARGET)
            .unwrap();
        prop_assert_eq!(request.wire_size(), TARGET);
    }
}
