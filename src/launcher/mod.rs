//! Fortune escrow launcher: checks that a job can be funded, then creates, funds
//! and sets up the escrow and publishes its manifest.

mod payments;
mod pricing;
mod screening;
mod storage;

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use tracing::{error, info};

use crate::chain::{
    ChainError, ChainGateway, EscrowSetup, EvmGateway, parse_address, parse_token_amount,
    token_amount_from_f64,
};
use crate::config::{LauncherConfig, OracleConfig};
use crate::models::launcher::{EscrowLaunched, EscrowManifest, EscrowRequest};

pub use self::payments::{Payment, PaymentProvider, StripePayments};
pub use self::pricing::{CoinGeckoPrices, PriceOracle};
pub use self::screening::CurseWordFilter;
pub use self::storage::{ManifestStore, S3ManifestStore};

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Invalid Chain Id")]
    InvalidChain,
    #[error("Chain Id not supported")]
    UnsupportedChain,
    #[error("Invalid Payment Id")]
    InvalidPaymentId,
    #[error("{0}")]
    Schema(String),
    #[error("Balance not enough for funding the escrow")]
    InsufficientBalance,
    #[error("Balance not enough for funding the escrow for payment {0}")]
    InsufficientBalanceForPayment(String),
    #[error("Balance or allowance not enough for funding the escrow")]
    InsufficientAllowance,
    #[error("Payment not found or has not yet been made correctly")]
    PaymentNotSettled,
    #[error("Title or description contains curse words")]
    CurseWords,
    #[error("{0}")]
    Chain(#[from] ChainError),
    #[error("Payment lookup failed: {0:#}")]
    Payments(anyhow::Error),
    #[error("HMT price lookup failed: {0:#}")]
    Pricing(anyhow::Error),
    #[error("Manifest upload failed: {0:#}")]
    Storage(anyhow::Error),
}

pub struct EscrowNetwork {
    pub chain_id: u64,
    pub title: String,
    pub factory_address: Address,
    pub gateway: Arc<dyn ChainGateway>,
}

/// Oracles written into every manifest and escrow setup.
#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub recording_address: Address,
    pub reputation_address: Address,
    pub exchange_address: Address,
    pub recording_url: String,
    pub reputation_url: String,
    pub exchange_url: String,
    pub recording_fee_percentage: u8,
    pub reputation_fee_percentage: u8,
}

impl OracleSettings {
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        Ok(Self {
            recording_address: parse_address(&config.recording_address)?,
            reputation_address: parse_address(&config.reputation_address)?,
            exchange_address: parse_address(&config.exchange_address)?,
            recording_url: config.recording_url.clone(),
            reputation_url: config.reputation_url.clone(),
            exchange_url: config.exchange_url.clone(),
            recording_fee_percentage: config.recording_fee_percentage,
            reputation_fee_percentage: config.reputation_fee_percentage,
        })
    }

    fn manifest(&self, request: EscrowRequest) -> EscrowManifest {
        EscrowManifest {
            request,
            recording_oracle_address: self.recording_address.to_string(),
            reputation_oracle_address: self.reputation_address.to_string(),
            exchange_oracle_address: self.exchange_address.to_string(),
            recording_oracle_url: self.recording_url.clone(),
            reputation_oracle_url: self.reputation_url.clone(),
            exchange_oracle_url: self.exchange_url.clone(),
        }
    }
}

/// A request that passed validation, with its addresses and counts parsed.
struct ValidEscrow<'a> {
    network: &'a EscrowNetwork,
    token: Address,
    job_requester: Address,
    fortunes_required: u64,
    request: EscrowRequest,
}

pub struct LauncherService {
    networks: HashMap<u64, EscrowNetwork>,
    oracles: OracleSettings,
    manifests: Arc<dyn ManifestStore>,
    payments: Arc<dyn PaymentProvider>,
    prices: Arc<dyn PriceOracle>,
    screen: CurseWordFilter,
}

impl LauncherService {
    pub fn new(
        networks: Vec<EscrowNetwork>,
        oracles: OracleSettings,
        manifests: Arc<dyn ManifestStore>,
        payments: Arc<dyn PaymentProvider>,
        prices: Arc<dyn PriceOracle>,
        screen: CurseWordFilter,
    ) -> Self {
        let networks = networks
            .into_iter()
            .map(|network| (network.chain_id, network))
            .collect();
        Self {
            networks,
            oracles,
            manifests,
            payments,
            prices,
            screen,
        }
    }

    pub async fn connect(config: &LauncherConfig) -> Result<Self> {
        let signer: PrivateKeySigner = config
            .private_key
            .trim()
            .parse()
            .context("Launcher private_key is not a valid secp256k1 key")?;
        info!(account = %signer.address(), "Launcher wallet loaded");

        let mut networks = Vec::with_capacity(config.networks.len());
        for network in &config.networks {
            let factory = network
                .factory_address
                .as_deref()
                .with_context(|| format!("Network {} has no factory_address", network.chain_id))?;
            let gateway = EvmGateway::connect(network, signer.clone(), config.receipt_timeout())?;
            gateway.verify_chain_id().await;
            networks.push(EscrowNetwork {
                chain_id: network.chain_id,
                title: network.title.clone(),
                factory_address: parse_address(factory)?,
                gateway: Arc::new(gateway),
            });
        }

        Ok(Self::new(
            networks,
            OracleSettings::from_config(&config.oracles)?,
            Arc::new(S3ManifestStore::new(&config.storage)?),
            Arc::new(StripePayments::new(&config.stripe)?),
            Arc::new(CoinGeckoPrices::new(&config.pricing)?),
            CurseWordFilter::new(&config.extra_curse_words),
        ))
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// Confirms the funder can cover the escrow without touching the chain state.
    pub async fn check_escrow(&self, request: EscrowRequest) -> Result<bool, LaunchError> {
        let escrow = self.validate(request, false)?;
        let gateway = &escrow.network.gateway;
        let fund_amount = fund_amount(escrow.request.fund_amount)?;
        let funder = if escrow.request.fiat {
            gateway.account()
        } else {
            escrow.job_requester
        };

        let balance = gateway.balance_of(escrow.token, funder).await?;
        if balance < fund_amount {
            return Err(LaunchError::InsufficientBalance);
        }
        self.screen_text(&escrow.request)?;
        Ok(true)
    }

    pub async fn create_escrow(&self, request: EscrowRequest) -> Result<EscrowLaunched, LaunchError> {
        let escrow = self.validate(request, true)?;
        let network = escrow.network;
        let gateway = &network.gateway;
        let account = gateway.account();

        let (funder, amount) = if escrow.request.fiat {
            let payment_id = escrow
                .request
                .payment_id
                .as_deref()
                .ok_or(LaunchError::InvalidPaymentId)?;
            let payment = self
                .payments
                .payment(payment_id)
                .await
                .map_err(LaunchError::Payments)?
                .filter(Payment::succeeded)
                .ok_or(LaunchError::PaymentNotSettled)?;
            let hmt = self
                .prices
                .hmt_amount(payment.amount as f64 / 100.0, &payment.currency)
                .await
                .map_err(LaunchError::Pricing)?;
            let amount = quoted_fund_amount(hmt)?;
            let balance = gateway.balance_of(escrow.token, account).await?;
            if balance < amount {
                return Err(LaunchError::InsufficientBalanceForPayment(payment.id));
            }
            (account, amount)
        } else {
            let amount = fund_amount(escrow.request.fund_amount)?;
            let allowance = gateway
                .allowance(escrow.token, escrow.job_requester, account)
                .await?;
            let balance = gateway.balance_of(escrow.token, escrow.job_requester).await?;
            if allowance < amount || balance < amount {
                return Err(LaunchError::InsufficientAllowance);
            }
            (escrow.job_requester, amount)
        };

        self.screen_text(&escrow.request)?;

        let escrow_address = gateway
            .create_escrow(network.factory_address, escrow.token, vec![escrow.job_requester])
            .await?;
        if funder == account {
            gateway.transfer(escrow.token, escrow_address, amount).await?;
        } else {
            gateway
                .transfer_from(escrow.token, funder, escrow_address, amount)
                .await?;
        }

        let key = format!("{escrow_address}-manifest.json");
        let manifest = self.oracles.manifest(escrow.request);
        let body = serde_json::to_vec(&manifest)
            .map_err(|err| LaunchError::Storage(anyhow::Error::new(err)))?;
        let url = self
            .manifests
            .put_json(&key, body)
            .await
            .map_err(|err| {
                error!(%escrow_address, "Manifest upload failed: {err:#}");
                LaunchError::Storage(err)
            })?;

        let setup = EscrowSetup {
            reputation_oracle: self.oracles.reputation_address,
            recording_oracle: self.oracles.recording_address,
            reputation_oracle_stake: U256::from(self.oracles.reputation_fee_percentage),
            recording_oracle_stake: U256::from(self.oracles.recording_fee_percentage),
            url: url.clone(),
            hash: url,
            solutions_requested: U256::from(escrow.fortunes_required),
        };
        gateway.setup_escrow(escrow_address, &setup).await?;

        info!(
            chain_id = network.chain_id,
            network = %network.title,
            %escrow_address,
            "Escrow launched and funded"
        );
        Ok(EscrowLaunched {
            escrow_address: escrow_address.to_string(),
            exchange_url: format!("{}?address={escrow_address}", manifest.exchange_oracle_url),
        })
    }

    fn validate(
        &self,
        request: EscrowRequest,
        require_payment: bool,
    ) -> Result<ValidEscrow<'_>, LaunchError> {
        if require_payment && request.fiat && request.payment_id.is_none() {
            return Err(LaunchError::InvalidPaymentId);
        }
        let chain_id = request.chain_id.ok_or(LaunchError::InvalidChain)?;
        let network = self
            .networks
            .get(&chain_id)
            .ok_or(LaunchError::UnsupportedChain)?;

        let token = parse_address(&request.token)
            .map_err(|_| LaunchError::Schema("token must be a valid address".to_string()))?;
        let job_requester = parse_address(&request.job_requester).map_err(|_| {
            LaunchError::Schema("jobRequester must be a valid address".to_string())
        })?;
        if request.title.trim().is_empty() {
            return Err(LaunchError::Schema("title must not be empty".to_string()));
        }
        if request.description.trim().is_empty() {
            return Err(LaunchError::Schema(
                "description must not be empty".to_string(),
            ));
        }
        if !(request.fund_amount.is_finite() && request.fund_amount > 0.0) {
            return Err(LaunchError::Schema(
                "fundAmount must be a positive number".to_string(),
            ));
        }
        let fortunes = request.fortunes_required;
        if !(fortunes.is_finite() && fortunes >= 1.0 && fortunes.fract() == 0.0) {
            return Err(LaunchError::Schema(
                "fortunesRequired must be a positive integer".to_string(),
            ));
        }

        Ok(ValidEscrow {
            network,
            token,
            job_requester,
            fortunes_required: fortunes as u64,
            request,
        })
    }

    fn screen_text(&self, request: &EscrowRequest) -> Result<(), LaunchError> {
        if self.screen.contains_curse_word(&request.title)
            || self.screen.contains_curse_word(&request.description)
        {
            return Err(LaunchError::CurseWords);
        }
        Ok(())
    }
}

fn fund_amount(tokens: f64) -> Result<U256, LaunchError> {
    let amount =
        token_amount_from_f64(tokens).map_err(|err| LaunchError::Schema(err.to_string()))?;
    if amount.is_zero() {
        return Err(LaunchError::Schema(
            "fundAmount must be a positive number".to_string(),
        ));
    }
    Ok(amount)
}

/// A converted fiat amount carries float noise past 18 decimals; it is cut to whole base
/// units and must still be positive.
fn quoted_fund_amount(tokens: f64) -> Result<U256, LaunchError> {
    if !(tokens.is_finite() && tokens > 0.0) {
        return Err(LaunchError::Pricing(anyhow::anyhow!(
            "quote of {tokens} HMT is not a positive amount"
        )));
    }
    let amount = parse_token_amount(&format!("{tokens:.18}")).map_err(LaunchError::Pricing)?;
    if amount.is_zero() {
        return Err(LaunchError::Pricing(anyhow::anyhow!(
            "quote of {tokens} HMT is below one base unit"
        )));
    }
    Ok(amount)
}

#[cfg(test)]
pub mod testing {
    //! In-memory SaaS stand-ins shared by the launcher and router tests.

    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::*;

    pub struct FakePayments(pub Option<Payment>);

    #[async_trait]
    impl PaymentProvider for FakePayments {
        async fn payment(&self, payment_id: &str) -> Result<Option<Payment>> {
            Ok(self.0.clone().filter(|payment| payment.id == payment_id))
        }
    }

    /// Quotes HMT at a fixed price in every currency.
    pub struct FixedPrice(pub f64);

    #[async_trait]
    impl PriceOracle for FixedPrice {
        async fn hmt_amount(&self, amount: f64, _currency: &str) -> Result<f64> {
            Ok(amount / self.0)
        }
    }

    #[derive(Default)]
    pub struct MemoryStore {
        pub objects: Mutex<Vec<(String, serde_json::Value)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl ManifestStore for MemoryStore {
        async fn put_json(&self, key: &str, body: Vec<u8>) -> Result<String> {
            if self.fail {
                return Err(anyhow!("bucket unavailable"));
            }
            let value = serde_json::from_slice(&body)?;
            self.objects.lock().unwrap().push((key.to_string(), value));
            Ok(format!("https://storage.example/manifests/{key}"))
        }
    }

    pub fn oracles() -> OracleSettings {
        OracleSettings {
            recording_address: Address::repeat_byte(0x0a),
            reputation_address: Address::repeat_byte(0x0b),
            exchange_address: Address::repeat_byte(0x0c),
            recording_url: "http://recording.example".to_string(),
            reputation_url: "http://reputation.example".to_string(),
            exchange_url: "http://exchange.example".to_string(),
            recording_fee_percentage: 10,
            reputation_fee_percentage: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::chain::parse_token_amount;
    use crate::chain::testing::{FakeGateway, Sent};

    const TOKEN: &str = "0xd1ba9BAC957322D6e8c07a160a3A8dA11A0d2867";
    const REQUESTER: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn wallet() -> Address {
        Address::repeat_byte(0x1a)
    }

    fn factory() -> Address {
        Address::repeat_byte(0xfc)
    }

    fn requester() -> Address {
        parse_address(REQUESTER).unwrap()
    }

    fn token() -> Address {
        parse_address(TOKEN).unwrap()
    }

    fn hmt(amount: &str) -> U256 {
        parse_token_amount(amount).unwrap()
    }

    fn request() -> EscrowRequest {
        EscrowRequest {
            chain_id: Some(80001),
            title: "Fortunes".to_string(),
            description: "Tell me a fortune".to_string(),
            fortunes_required: 3.0,
            token: TOKEN.to_string(),
            fund_amount: 5.0,
            job_requester: REQUESTER.to_string(),
            payment_id: None,
            fiat: false,
        }
    }

    fn fiat_request() -> EscrowRequest {
        EscrowRequest {
            fiat: true,
            payment_id: Some("pi_1".to_string()),
            ..request()
        }
    }

    fn payment(status: &str) -> Payment {
        Payment {
            id: "pi_1".to_string(),
            status: status.to_string(),
            amount: 2_500,
            currency: "usd".to_string(),
        }
    }

    struct Harness {
        gateway: Arc<FakeGateway>,
        store: Arc<MemoryStore>,
        service: LauncherService,
    }

    fn harness(gateway: FakeGateway, payment: Option<Payment>, store: MemoryStore) -> Harness {
        let gateway = Arc::new(gateway);
        let store = Arc::new(store);
        let network = EscrowNetwork {
            chain_id: 80001,
            title: "Polygon Mumbai".to_string(),
            factory_address: factory(),
            gateway: Arc::clone(&gateway) as Arc<dyn ChainGateway>,
        };
        let service = LauncherService::new(
            vec![network],
            oracles(),
            Arc::clone(&store) as Arc<dyn ManifestStore>,
            Arc::new(FakePayments(payment)),
            Arc::new(FixedPrice(0.5)),
            CurseWordFilter::default(),
        );
        Harness {
            gateway,
            store,
            service,
        }
    }

    fn approved_requester() -> FakeGateway {
        FakeGateway::new(wallet())
            .with_balance(requester(), hmt("5"))
            .with_allowance(requester(), wallet(), hmt("5"))
    }

    #[tokio::test]
    async fn chain_validation() {
        let h = harness(approved_requester(), None, MemoryStore::default());

        let missing = EscrowRequest {
            chain_id: None,
            ..request()
        };
        assert!(matches!(
            h.service.check_escrow(missing).await,
            Err(LaunchError::InvalidChain)
        ));

        let unsupported = EscrowRequest {
            chain_id: Some(5),
            ..request()
        };
        assert!(matches!(
            h.service.create_escrow(unsupported).await,
            Err(LaunchError::UnsupportedChain)
        ));
    }

    #[tokio::test]
    async fn schema_validation() {
        let h = harness(approved_requester(), None, MemoryStore::default());
        let bad_token = EscrowRequest {
            token: "0x1234".to_string(),
            ..request()
        };
        let zero_fortunes = EscrowRequest {
            fortunes_required: 0.0,
            ..request()
        };
        let fractional = EscrowRequest {
            fortunes_required: 2.5,
            ..request()
        };
        let negative_fund = EscrowRequest {
            fund_amount: -1.0,
            ..request()
        };
        for invalid in [bad_token, zero_fortunes, fractional, negative_fund] {
            assert!(matches!(
                h.service.check_escrow(invalid).await,
                Err(LaunchError::Schema(_))
            ));
        }
    }

    #[tokio::test]
    async fn sub_wei_fund_amount_is_rejected() {
        let h = harness(FakeGateway::new(wallet()), None, MemoryStore::default());
        for tiny in [1e-19, 5e-324] {
            let dust = EscrowRequest {
                fund_amount: tiny,
                ..request()
            };
            assert!(matches!(
                h.service.check_escrow(dust.clone()).await,
                Err(LaunchError::Schema(_))
            ));
            assert!(matches!(
                h.service.create_escrow(dust).await,
                Err(LaunchError::Schema(_))
            ));
        }
        assert!(h.gateway.sent().is_empty());
        assert!(h.store.objects.lock().unwrap().is_empty());
    }

    #[test]
    fn fiat_quotes_are_cut_to_whole_base_units() {
        assert_eq!(quoted_fund_amount(50.0).unwrap(), hmt("50"));
        assert_eq!(
            quoted_fund_amount(0.1 + 0.2).unwrap(),
            hmt("0.300000000000000044")
        );
        assert!(matches!(
            quoted_fund_amount(1e-19),
            Err(LaunchError::Pricing(_))
        ));
        assert!(matches!(
            quoted_fund_amount(f64::NAN),
            Err(LaunchError::Pricing(_))
        ));
    }

    #[tokio::test]
    async fn check_uses_requester_balance() {
        let h = harness(approved_requester(), None, MemoryStore::default());
        assert!(h.service.check_escrow(request()).await.unwrap());

        let too_much = EscrowRequest {
            fund_amount: 6.0,
            ..request()
        };
        assert!(matches!(
            h.service.check_escrow(too_much).await,
            Err(LaunchError::InsufficientBalance)
        ));
    }

    #[tokio::test]
    async fn check_uses_wallet_balance_for_fiat() {
        let gateway = FakeGateway::new(wallet()).with_balance(wallet(), hmt("5"));
        let h = harness(gateway, None, MemoryStore::default());
        assert!(h.service.check_escrow(fiat_request()).await.unwrap());

        let h = harness(approved_requester(), None, MemoryStore::default());
        assert!(matches!(
            h.service.check_escrow(fiat_request()).await,
            Err(LaunchError::InsufficientBalance)
        ));
    }

    #[tokio::test]
    async fn check_screens_text_after_balance() {
        let h = harness(approved_requester(), None, MemoryStore::default());
        let rude = EscrowRequest {
            title: "damn fortunes".to_string(),
            ..request()
        };
        assert!(matches!(
            h.service.check_escrow(rude).await,
            Err(LaunchError::CurseWords)
        ));
    }

    #[tokio::test]
    async fn crypto_escrow_is_funded_with_transfer_from() {
        let h = harness(approved_requester(), None, MemoryStore::default());
        let launched = h.service.create_escrow(request()).await.expect("escrow launched");

        let escrow = h.gateway.escrow;
        assert_eq!(launched.escrow_address, escrow.to_string());
        assert_eq!(
            launched.exchange_url,
            format!("http://exchange.example?address={escrow}")
        );

        let url = format!("https://storage.example/manifests/{escrow}-manifest.json");
        assert_eq!(
            h.gateway.sent(),
            vec![
                Sent::CreateEscrow {
                    factory: factory(),
                    token: token(),
                    handlers: vec![requester()],
                },
                Sent::TransferFrom {
                    from: requester(),
                    to: escrow,
                    amount: hmt("5"),
                },
                Sent::Setup {
                    escrow,
                    setup: EscrowSetup {
                        reputation_oracle: oracles().reputation_address,
                        recording_oracle: oracles().recording_address,
                        reputation_oracle_stake: U256::from(10),
                        recording_oracle_stake: U256::from(10),
                        url: url.clone(),
                        hash: url,
                        solutions_requested: U256::from(3),
                    },
                },
            ]
        );

        let objects = h.store.objects.lock().unwrap();
        assert_eq!(objects.len(), 1);
        let (key, manifest) = &objects[0];
        assert_eq!(key, &format!("{escrow}-manifest.json"));
        assert_eq!(manifest["title"], "Fortunes");
        assert_eq!(manifest["exchangeOracleUrl"], "http://exchange.example");
        assert_eq!(
            manifest["recordingOracleAddress"],
            oracles().recording_address.to_string()
        );
    }

    #[tokio::test]
    async fn crypto_escrow_needs_allowance() {
        let gateway = FakeGateway::new(wallet())
            .with_balance(requester(), hmt("5"))
            .with_allowance(requester(), wallet(), hmt("4"));
        let h = harness(gateway, None, MemoryStore::default());
        assert!(matches!(
            h.service.create_escrow(request()).await,
            Err(LaunchError::InsufficientAllowance)
        ));
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn fiat_escrow_is_funded_from_the_wallet() {
        // 25 USD at 0.5 USD per HMT.
        let gateway = FakeGateway::new(wallet()).with_balance(wallet(), hmt("100"));
        let h = harness(gateway, Some(payment("succeeded")), MemoryStore::default());
        h.service
            .create_escrow(fiat_request())
            .await
            .expect("fiat escrow launched");

        let sent = h.gateway.sent();
        assert_eq!(
            sent[1],
            Sent::Transfer {
                to: h.gateway.escrow,
                amount: hmt("50"),
            }
        );
    }

    #[tokio::test]
    async fn fiat_escrow_requires_settled_payment() {
        let gateway = FakeGateway::new(wallet()).with_balance(wallet(), hmt("100"));
        let h = harness(gateway, Some(payment("processing")), MemoryStore::default());
        assert!(matches!(
            h.service.create_escrow(fiat_request()).await,
            Err(LaunchError::PaymentNotSettled)
        ));

        let no_payment_id = EscrowRequest {
            payment_id: None,
            ..fiat_request()
        };
        assert!(matches!(
            h.service.create_escrow(no_payment_id).await,
            Err(LaunchError::InvalidPaymentId)
        ));
    }

    #[tokio::test]
    async fn fiat_escrow_requires_wallet_balance() {
        let gateway = FakeGateway::new(wallet()).with_balance(wallet(), hmt("49"));
        let h = harness(gateway, Some(payment("succeeded")), MemoryStore::default());
        let err = h.service.create_escrow(fiat_request()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Balance not enough for funding the escrow for payment pi_1"
        );
    }

    #[tokio::test]
    async fn storage_failure_stops_before_setup() {
        let store = MemoryStore {
            fail: true,
            ..MemoryStore::default()
        };
        let h = harness(approved_requester(), None, store);
        assert!(matches!(
            h.service.create_escrow(request()).await,
            Err(LaunchError::Storage(_))
        ));
        assert!(
            !h.gateway
                .sent()
                .iter()
                .any(|sent| matches!(sent, Sent::Setup { .. }))
        );
    }
}
