//! Currency conversion for display.
//!
//! Prices stay in USD everywhere; converted amounts are presentation only.
//! A card issues a [`ConversionTicket`] per request and only the newest
//! ticket may commit its result.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use crate::domain::value_objects::{CurrencyCode, Money};

/// Codes a visitor may pick, with display names.
pub static SUPPORTED_CURRENCIES: &[(&str, &str)] = &[
    ("USD", "US Dollar"),
    ("EUR", "Euro"),
    ("GBP", "British Pound"),
    ("JPY", "Japanese Yen"),
    ("CAD", "Canadian Dollar"),
    ("AUD", "Australian Dollar"),
    ("MXN", "Mexican Peso"),
    ("BRL", "Brazilian Real"),
    ("COP", "Colombian Peso"),
    ("AED", "UAE Dirham"),
    ("ALL", "Albanian Lek"),
    ("AMD", "Armenian Dram"),
    ("ANG", "Netherlands Antillean Guilder"),
    ("AOA", "Angolan Kwanza"),
    ("ARS", "Argentine Peso"),
    ("AWG", "Aruban Florin"),
    ("AZN", "Azerbaijani Manat"),
    ("BAM", "Bosnia-Herzegovina Convertible Mark"),
    ("BBD", "Barbadian Dollar"),
    ("BDT", "Bangladeshi Taka"),
    ("BGN", "Bulgarian Lev"),
    ("BHD", "Bahraini Dinar"),
    ("BMD", "Bermudan Dollar"),
    ("BND", "Brunei Dollar"),
    ("BOB", "Bolivian Boliviano"),
    ("BSD", "Bahamian Dollar"),
    ("BTN", "Bhutanese Ngultrum"),
    ("BWP", "Botswanan Pula"),
    ("BZD", "Belize Dollar"),
    ("CHF", "Swiss Franc"),
    ("CLP", "Chilean Peso"),
    ("CNY", "Chinese Yuan"),
    ("CRC", "Costa Rican Colón"),
    ("CVE", "Cape Verdean Escudo"),
    ("CZK", "Czech Republic Koruna"),
    ("DJF", "Djiboutian Franc"),
    ("DKK", "Danish Krone"),
    ("DOP", "Dominican Peso"),
    ("DZD", "Algerian Dinar"),
    ("EGP", "Egyptian Pound"),
    ("ETB", "Ethiopian Birr"),
    ("FJD", "Fijian Dollar"),
    ("FKP", "Falkland Islands Pound"),
    ("GEL", "Georgian Lari"),
    ("GGP", "Guernsey Pound"),
    ("GHS", "Ghanaian Cedi"),
    ("GIP", "Gibraltar Pound"),
    ("GMD", "Gambian Dalasi"),
    ("GNF", "Guinean Franc"),
    ("GTQ", "Guatemalan Quetzal"),
    ("GYD", "Guyanaese Dollar"),
    ("HKD", "Hong Kong Dollar"),
    ("HNL", "Honduran Lempira"),
    ("HRK", "Croatian Kuna"),
    ("HTG", "Haitian Gourde"),
    ("HUF", "Hungarian Forint"),
    ("IDR", "Indonesian Rupiah"),
    ("ILS", "Israeli New Sheqel"),
    ("IMP", "Manx pound"),
    ("INR", "Indian Rupee"),
    ("ISK", "Icelandic Króna"),
    ("JEP", "Jersey Pound"),
    ("JMD", "Jamaican Dollar"),
    ("JOD", "Jordanian Dinar"),
    ("KES", "Kenyan Shilling"),
    ("KGS", "Kyrgystani Som"),
    ("KHR", "Cambodian Riel"),
    ("KMF", "Comorian Franc"),
    ("KRW", "South Korean Won"),
    ("KWD", "Kuwaiti Dinar"),
    ("KYD", "Cayman Islands Dollar"),
    ("KZT", "Kazakhstani Tenge"),
    ("LAK", "Laotian Kip"),
    ("LBP", "Lebanese Pound"),
    ("LKR", "Sri Lankan Rupee"),
    ("LRD", "Liberian Dollar"),
    ("LSL", "Lesotho Loti"),
    ("MAD", "Moroccan Dirham"),
    ("MDL", "Moldovan Leu"),
    ("MGA", "Malagasy Ariary"),
    ("MKD", "Macedonian Denar"),
    ("MNT", "Mongolian Tugrik"),
    ("MOP", "Macanese Pataca"),
    ("MRU", "Mauritanian Ouguiya"),
    ("MUR", "Mauritian Rupee"),
    ("MVR", "Maldivian Rufiyaa"),
    ("MWK", "Malawian Kwacha"),
    ("MYR", "Malaysian Ringgit"),
    ("MZN", "Mozambican Metical"),
    ("NAD", "Namibian Dollar"),
    ("NGN", "Nigerian Naira"),
    ("NIO", "Nicaraguan Córdoba"),
    ("NOK", "Norwegian Krone"),
    ("NPR", "Nepalese Rupee"),
    ("NZD", "New Zealand Dollar"),
    ("OMR", "Omani Rial"),
    ("PAB", "Panamanian Balboa"),
    ("PEN", "Peruvian Nuevo Sol"),
    ("PGK", "Papua New Guinean Kina"),
    ("PHP", "Philippine Peso"),
    ("PKR", "Pakistani Rupee"),
    ("PLN", "Polish Zloty"),
    ("PYG", "Paraguayan Guarani"),
    ("QAR", "Qatari Rial"),
    ("RON", "Romanian Leu"),
    ("RSD", "Serbian Dinar"),
    ("RWF", "Rwandan Franc"),
    ("SAR", "Saudi Riyal"),
    ("SBD", "Solomon Islands Dollar"),
    ("SCR", "Seychellois Rupee"),
    ("SEK", "Swedish Krona"),
    ("SGD", "Singapore Dollar"),
    ("SHP", "Saint Helena Pound"),
    ("SLL", "Sierra Leonean Leone"),
    ("SRD", "Surinamese Dollar"),
    ("SVC", "Salvadoran Colón"),
    ("SZL", "Swazi Lilangeni"),
    ("THB", "Thai Baht"),
    ("TMT", "Turkmenistani Manat"),
    ("TND", "Tunisian Dinar"),
    ("TOP", "Tongan Paʻanga"),
    ("TRY", "Turkish Lira"),
    ("TTD", "Trinidad and Tobago Dollar"),
    ("TWD", "New Taiwan Dollar"),
    ("TZS", "Tanzanian Shilling"),
    ("UAH", "Ukrainian Hryvnia"),
    ("UGX", "Ugandan Shilling"),
    ("UYU", "Uruguayan Peso"),
    ("UZS", "Uzbekistan Som"),
    ("VND", "Vietnamese Dong"),
    ("VUV", "Vanuatu Vatu"),
    ("WST", "Samoan Tala"),
    ("XCD", "East Caribbean Dollar"),
    ("XOF", "CFA Franc BCEAO"),
    ("XPF", "CFP Franc"),
    ("ZAR", "South African Rand"),
    ("ZMW", "Zambian Kwacha"),
];

pub fn is_supported(code: &str) -> bool {
    SUPPORTED_CURRENCIES.iter().any(|(c, _)| *c == code)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("rate source unreachable: {0}")]
    Transport(String),
    #[error("rate source answered with status {0}")]
    Status(u16),
    #[error("rate payload could not be decoded: {0}")]
    Decode(String),
    #[error("no rate for currency {0}")]
    MissingRate(String),
    #[error("currency {0} is not supported")]
    UnsupportedCurrency(String),
    #[error("rate lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("converted amount for {0} is out of range")]
    Overflow(String),
    #[error("conversion task ended early: {0}")]
    Aborted(String),
}

/// External source of USD-relative multipliers. One call covers every currency.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn latest_rates(&self) -> Result<HashMap<String, Decimal>, ConversionError>;
}

#[derive(Debug, Deserialize)]
struct RatesPayload { rates: HashMap<String, Decimal> }

/// Public exchange-rate endpoint returning `{ "rates": { "EUR": 0.92, ... } }`.
#[derive(Clone, Debug)]
pub struct HttpRateSource { client: reqwest::Client, url: String }

impl HttpRateSource {
    pub fn new(url: impl Into<String>) -> Self { Self { client: reqwest::Client::new(), url: url.into() } }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn latest_rates(&self) -> Result<HashMap<String, Decimal>, ConversionError> {
        let resp = self.client.get(&self.url).send().await.map_err(|e| ConversionError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ConversionError::Status(resp.status().as_u16()));
        }
        let payload: RatesPayload = resp.json().await.map_err(|e| ConversionError::Decode(e.to_string()))?;
        Ok(payload.rates)
    }
}

/// One conversion request issued by a product card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionTicket {
    pub product_id: String,
    pub generation: u64,
    pub amount: Decimal,
    pub currency: CurrencyCode,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "amount", rename_all = "lowercase")]
pub enum ConversionState {
    #[default]
    Idle,
    Pending,
    Converted(Money),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversionCommit {
    Applied(Money),
    Discarded,
}

#[derive(Clone)]
pub struct CurrencyConverter { source: Arc<dyn RateSource>, timeout: Duration }

impl CurrencyConverter {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(source: Arc<dyn RateSource>, timeout: Duration) -> Self { Self { source, timeout } }

    /// `Ok(None)` for the base currency: nothing to fetch, the raw amount is shown.
    pub async fn convert(&self, amount_usd: Decimal, target: &CurrencyCode) -> Result<Option<Money>, ConversionError> {
        if target.is_base() {
            return Ok(None);
        }
        if !is_supported(target.as_str()) {
            return Err(ConversionError::UnsupportedCurrency(target.to_string()));
        }
        let rates = tokio::time::timeout(self.timeout, self.source.latest_rates())
            .await
            .map_err(|_| ConversionError::Timeout(self.timeout))??;
        let rate = rates
            .get(target.as_str())
            .copied()
            .filter(|r| *r > Decimal::ZERO)
            .ok_or_else(|| ConversionError::MissingRate(target.to_string()))?;
        let amount = amount_usd.checked_mul(rate).ok_or_else(|| ConversionError::Overflow(target.to_string()))?;
        let converted = Money::new(amount, target.clone()).rounded();
        debug!(currency = %target, %rate, amount = %converted.amount(), "converted price");
        Ok(Some(converted))
    }

    pub async fn run(&self, ticket: &ConversionTicket) -> Result<Money, ConversionError> {
        let result = self.convert(ticket.amount, &ticket.currency).await;
        if let Err(e) = &result {
            warn!(product_id = %ticket.product_id, generation = ticket.generation, error = %e, "conversion failed");
        }
        Ok(result?.unwrap_or_else(|| Money::usd(ticket.amount)))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    pub struct StaticRates(pub HashMap<String, Decimal>);

    impl StaticRates {
        pub fn single(code: &str, rate: Decimal) -> Self { Self(HashMap::from([(code.to_string(), rate)])) }
    }

    #[async_trait]
    impl RateSource for StaticRates {
        async fn latest_rates(&self) -> Result<HashMap<String, Decimal>, ConversionError> { Ok(self.0.clone()) }
    }

    pub struct FailingRates;

    #[async_trait]
    impl RateSource for FailingRates {
        async fn latest_rates(&self) -> Result<HashMap<String, Decimal>, ConversionError> {
            Err(ConversionError::Transport("connection refused".into()))
        }
    }

    /// Holds the first fetch until `release` is called; later fetches answer at once.
    pub struct GatedRates {
        rates: HashMap<String, Decimal>,
        calls: AtomicUsize,
        gate: Notify,
    }

    impl GatedRates {
        pub fn new(rates: impl IntoIterator<Item = (&'static str, Decimal)>) -> Self {
            Self {
                rates: rates.into_iter().map(|(code, rate)| (code.to_string(), rate)).collect(),
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
            }
        }

        pub fn release(&self) { self.gate.notify_one(); }
        pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
    }

    #[async_trait]
    impl RateSource for GatedRates {
        async fn latest_rates(&self) -> Result<HashMap<String, Decimal>, ConversionError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.gate.notified().await;
            }
            Ok(self.rates.clone())
        }
    }

    pub struct StalledRates;

    #[async_trait]
    impl RateSource for StalledRates {
        async fn latest_rates(&self) -> Result<HashMap<String, Decimal>, ConversionError> {
            std::future::pending().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::testing::*;

    fn eur() -> CurrencyCode { CurrencyCode::new("EUR").unwrap() }

    #[tokio::test]
    async fn test_convert_rounds_to_cents() {
        let converter = CurrencyConverter::new(Arc::new(StaticRates::single("EUR", Decimal::new(110, 2))), CurrencyConverter::DEFAULT_TIMEOUT);
        let money = converter.convert(Decimal::new(18, 0), &eur()).await.unwrap().unwrap();
        assert_eq!(money.display(), "19.80 EUR");
    }

    #[tokio::test]
    async fn test_base_currency_is_noop() {
        let converter = CurrencyConverter::new(Arc::new(FailingRates), CurrencyConverter::DEFAULT_TIMEOUT);
        assert_eq!(converter.convert(Decimal::new(18, 0), &CurrencyCode::usd()).await, Ok(None));
    }

    #[tokio::test]
    async fn test_failures() {
        let missing = CurrencyConverter::new(Arc::new(StaticRates::single("GBP", Decimal::ONE)), CurrencyConverter::DEFAULT_TIMEOUT);
        assert_eq!(missing.convert(Decimal::ONE, &eur()).await, Err(ConversionError::MissingRate("EUR".into())));

        let zero = CurrencyConverter::new(Arc::new(StaticRates::single("EUR", Decimal::ZERO)), CurrencyConverter::DEFAULT_TIMEOUT);
        assert_eq!(zero.convert(Decimal::ONE, &eur()).await, Err(ConversionError::MissingRate("EUR".into())));

        let down = CurrencyConverter::new(Arc::new(FailingRates), CurrencyConverter::DEFAULT_TIMEOUT);
        assert!(matches!(down.convert(Decimal::ONE, &eur()).await, Err(ConversionError::Transport(_))));

        let unknown = CurrencyConverter::new(Arc::new(FailingRates), CurrencyConverter::DEFAULT_TIMEOUT);
        let xxx = CurrencyCode::new("XXX").unwrap();
        assert_eq!(unknown.convert(Decimal::ONE, &xxx).await, Err(ConversionError::UnsupportedCurrency("XXX".into())));
    }

    #[tokio::test]
    async fn test_overflowing_rate_is_an_error() {
        let huge = Decimal::from_i128_with_scale(39_614_081_257_132_170_000_000_000_000, 0);
        let converter = CurrencyConverter::new(Arc::new(StaticRates::single("EUR", huge)), CurrencyConverter::DEFAULT_TIMEOUT);
        assert_eq!(converter.convert(Decimal::new(20, 0), &eur()).await, Err(ConversionError::Overflow("EUR".into())));
    }

    #[tokio::test]
    async fn test_gated_source_holds_first_fetch() {
        let gated = Arc::new(GatedRates::new([("EUR", Decimal::ONE)]));
        let converter = CurrencyConverter::new(gated.clone(), CurrencyConverter::DEFAULT_TIMEOUT);
        let slow = tokio::spawn({
            let converter = converter.clone();
            async move { converter.convert(Decimal::ONE, &eur()).await }
        });
        while gated.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!slow.is_finished());
        assert!(converter.convert(Decimal::ONE, &eur()).await.is_ok());
        gated.release();
        assert!(slow.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_timeout() {
        let timeout = Duration::from_millis(20);
        let converter = CurrencyConverter::new(Arc::new(StalledRates), timeout);
        assert_eq!(converter.convert(Decimal::ONE, &eur()).await, Err(ConversionError::Timeout(timeout)));
    }

    #[test]
    fn test_payload_shape() {
        let payload: RatesPayload = serde_json::from_str(r#"{"base":"USD","rates":{"USD":1,"EUR":0.92}}"#).unwrap();
        assert_eq!(payload.rates["EUR"], Decimal::new(92, 2));
    }

    #[test]
    fn test_supported_table() {
        assert!(is_supported("USD"));
        assert!(is_supported("ZMW"));
        assert!(!is_supported("XXX"));
    }
}
