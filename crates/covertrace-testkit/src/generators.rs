//! Proptest generators for property-based testing.
//!
//! Values stay inside the ranges the upload records are clamped to, so a
//! generated body is one the client could really send.

use proptest::prelude::*;

use covertrace_core::capper::MAX_KEYS_PER_UPLOAD;
use covertrace_core::{
    Country, KeysIndex, RiskLevel, TemporaryExposureKey, UploadBody, UploadExposureInfo,
    UploadLimits, UploadSummary, UploadTek,
};

/// A `yyyy-MM-dd` day in 2020.
pub fn day() -> impl Strategy<Value = String> {
    (1u32..=12, 1u32..=28).prop_map(|(month, day)| format!("2020-{month:02}-{day:02}"))
}

pub fn risk_level() -> impl Strategy<Value = RiskLevel> {
    (0u8..=8).prop_map(|level| RiskLevel::from_u8(level).unwrap_or_default())
}

pub fn country() -> impl Strategy<Value = Country> {
    prop::sample::select(Country::ALL.to_vec())
}

/// A key as the platform would return it.
pub fn temporary_exposure_key() -> impl Strategy<Value = TemporaryExposureKey> {
    (
        any::<[u8; 16]>(),
        2_600_000u32..2_700_000,
        1u32..=144,
        risk_level(),
    )
        .prop_map(|(key_data, rolling_start_number, rolling_period, transmission_risk)| {
            TemporaryExposureKey {
                key_data,
                rolling_start_number,
                rolling_period,
                transmission_risk,
            }
        })
}

pub fn upload_tek() -> impl Strategy<Value = UploadTek> {
    temporary_exposure_key().prop_map(|key| UploadTek::from(&key))
}

pub fn attenuation_durations() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..=1800, 3)
}

pub fn upload_exposure_info() -> impl Strategy<Value = UploadExposureInfo> {
    (
        day(),
        0u32..=1800,
        0u32..=255,
        attenuation_durations(),
        0u32..=8,
        0u32..=4096,
    )
        .prop_map(
            |(date, duration, attenuation_value, attenuation_durations, transmission_risk_level, total_risk_score)| {
                UploadExposureInfo {
                    date,
                    duration,
                    attenuation_value,
                    attenuation_durations,
                    transmission_risk_level,
                    total_risk_score,
                }
            },
        )
}

/// A summary carrying up to `max_infos` exposures.
pub fn upload_summary(max_infos: usize) -> impl Strategy<Value = UploadSummary> {
    (
        day(),
        0u64..=999,
        0i32..=14,
        attenuation_durations(),
        0u32..=4096,
        prop::collection::vec(upload_exposure_info(), 0..=max_infos),
    )
        .prop_map(
            |(date, matched_key_count, days_since_last_exposure, attenuation_durations, maximum_risk_score, exposure_info)| {
                UploadSummary {
                    date,
                    matched_key_count,
                    days_since_last_exposure,
                    attenuation_durations,
                    maximum_risk_score,
                    exposure_info,
                }
            },
        )
}

/// Province codes are two uppercase letters.
pub fn province() -> impl Strategy<Value = String> {
    "[A-Z]{2}".prop_map(String::from)
}

/// How large an upload body is, before capping.
#[derive(Debug, Clone)]
pub struct UploadShape {
    pub teks: Vec<UploadTek>,
    pub province: String,
    pub summaries: Vec<UploadSummary>,
    pub countries: Vec<Country>,
}

impl UploadShape {
    /// Build the capped body.
    pub fn body(&self, limits: &UploadLimits) -> UploadBody {
        let mut countries = self.countries.clone();
        countries.sort_unstable();
        countries.dedup();
        UploadBody::new(
            self.teks.clone(),
            self.province.clone(),
            self.summaries.clone(),
            countries,
            limits,
        )
    }
}

impl Arbitrary for UploadShape {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            prop::collection::vec(upload_tek(), 0..=MAX_KEYS_PER_UPLOAD + 2),
            province(),
            prop::collection::vec(upload_summary(12), 0..=20),
            prop::collection::vec(country(), 0..=Country::ALL.len()),
        )
            .prop_map(|(teks, province, summaries, countries)| UploadShape {
                teks,
                province,
                summaries,
                countries,
            })
            .boxed()
    }
}

pub fn keys_index() -> impl Strategy<Value = KeysIndex> {
    (0i64..1_000, 0i64..100).prop_map(|(oldest, span)| KeysIndex::new(oldest, oldest + span))
}

/// The largest body an upload can carry under `limits`.
pub fn maximal_upload_body(limits: &UploadLimits) -> UploadBody {
    UploadBody::maximal(limits)
}
