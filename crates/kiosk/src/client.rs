//! The public client: owns both channels and the command surface.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::{
    channel,
    config::KioskClientBuilder,
    correlator::Correlator,
    error::{KioskError, ReturnCode},
    events::{CommandChannelHandler, EventSinks, EventStream, ReaderChannelHandler},
    protocol::{
        ConfirmParams, EmptyParams, KioskStatus, PaymentOutcome, PaymentParameters, ReaderMessage,
        RequestId, RpcRequest, RpcResponse, ShowMessageParams, VersionParams, VoidParams,
        COMPONENT_KIOSK, COMPONENT_READER, ID_CANCEL_TRANSACTION, ID_CONFIRM_TRANSACTION,
        ID_GET_KIOSK_ID, ID_GET_KIOSK_VERSION, ID_GET_READER_VERSION, ID_GET_STATUS,
        ID_PAY_TRANSACTION, ID_PRE_AUTHORIZE, ID_SHOW_MESSAGE, ID_VOID_TRANSACTION,
        METHOD_CANCEL_TRANSACTION, METHOD_CONFIRM_TRANSACTION, METHOD_GET_KIOSK_ID,
        METHOD_GET_STATUS, METHOD_GET_VERSION, METHOD_PAY_TRANSACTION, METHOD_PRE_AUTHORIZE,
        METHOD_SHOW_MESSAGE, METHOD_VOID_TRANSACTION,
    },
    transport::Transport,
};

/// Handle to a kiosk reached over the dual-channel JSON-RPC link.
///
/// Owns the two channel workers; dropping the client stops them and closes
/// both sockets. Commands are serialized internally, so the client can be
/// shared (e.g. behind an `Arc`) without further coordination, though at
/// most one command is ever in flight.
pub struct KioskClient {
    command_transport: Arc<Transport>,
    correlator: Arc<Correlator>,
    transactions: Arc<EventSinks<PaymentOutcome>>,
    reader_messages: Arc<EventSinks<ReaderMessage>>,
    response_timeout: Duration,
    workers: Vec<JoinHandle<()>>,
}

impl KioskClient {
    pub fn builder() -> KioskClientBuilder {
        KioskClientBuilder::new()
    }
}

impl KioskClientBuilder {
    /// Resolves both endpoints, spawns the channel workers, and returns the
    /// client. The workers connect (and reconnect) in the background;
    /// commands issued before the link is up fail with a communication
    /// error.
    ///
    /// Must be called within a tokio runtime.
    pub fn connect(self) -> Result<KioskClient, KioskError> {
        let (command_config, reader_config) = self.channel_configs()?;

        let command_transport = Arc::new(Transport::new(command_config, "command"));
        let reader_transport = Arc::new(Transport::new(reader_config, "reader"));
        let correlator = Arc::new(Correlator::new());
        let transactions = Arc::new(EventSinks::new());
        let reader_messages = Arc::new(EventSinks::new());

        let command_worker = tokio::spawn(channel::run(
            command_transport.clone(),
            CommandChannelHandler {
                transport: command_transport.clone(),
                correlator: correlator.clone(),
                transactions: transactions.clone(),
            },
        ));
        let reader_worker = tokio::spawn(channel::run(
            reader_transport,
            ReaderChannelHandler {
                messages: reader_messages.clone(),
            },
        ));

        Ok(KioskClient {
            command_transport,
            correlator,
            transactions,
            reader_messages,
            response_timeout: self.response_timeout,
            workers: vec![command_worker, reader_worker],
        })
    }
}

impl KioskClient {
    /// Asks the kiosk for its current status.
    pub async fn get_status(&self) -> Result<KioskStatus, KioskError> {
        let request = RpcRequest::new(METHOD_GET_STATUS, ID_GET_STATUS, EmptyParams {});
        let response = self.call(&request).await?;
        let status = response.expect_string(ID_GET_STATUS)?;
        KioskStatus::from_wire(status)
            .ok_or_else(|| KioskError::parse(format!("unknown kiosk status '{status}'")))
    }

    /// The status an application should display, folding link failures into
    /// the [`KioskStatus::NoKiosk`] and [`KioskStatus::Error`]
    /// pseudo-states.
    pub async fn observed_status(&self) -> KioskStatus {
        if !self.command_transport.is_connected() {
            return KioskStatus::NoKiosk;
        }
        match self.get_status().await {
            Ok(status) => status,
            Err(err) if err.code() == ReturnCode::CommError => KioskStatus::NoKiosk,
            Err(_) => KioskStatus::Error,
        }
    }

    /// Whether the command channel currently has a live connection.
    pub fn is_connected(&self) -> bool {
        self.command_transport.is_connected()
    }

    /// Requests a two-line message on the reader screen.
    pub async fn show_message(&self, line1: &str, line2: &str) -> Result<(), KioskError> {
        let request = RpcRequest::new(
            METHOD_SHOW_MESSAGE,
            ID_SHOW_MESSAGE,
            ShowMessageParams { line1, line2 },
        );
        self.call(&request).await?.expect_ok_flag(ID_SHOW_MESSAGE)
    }

    /// Reads the kiosk's identification string.
    pub async fn kiosk_id(&self) -> Result<String, KioskError> {
        let request = RpcRequest::new(METHOD_GET_KIOSK_ID, ID_GET_KIOSK_ID, EmptyParams {});
        let response = self.call(&request).await?;
        Ok(response.expect_string(ID_GET_KIOSK_ID)?.to_string())
    }

    /// Reads the kiosk software version.
    pub async fn kiosk_version(&self) -> Result<String, KioskError> {
        self.version(COMPONENT_KIOSK, ID_GET_KIOSK_VERSION).await
    }

    /// Reads the card reader's firmware version.
    pub async fn reader_version(&self) -> Result<String, KioskError> {
        self.version(COMPONENT_READER, ID_GET_READER_VERSION).await
    }

    /// Starts a pre-authorization: the amount is only reserved, and the
    /// transaction must later be confirmed or voided. Success means the
    /// kiosk accepted the request; the actual outcome arrives through
    /// [`KioskClient::subscribe_transactions`].
    pub async fn pre_authorize(&self, params: &PaymentParameters) -> Result<(), KioskError> {
        let request = RpcRequest::new(METHOD_PRE_AUTHORIZE, ID_PRE_AUTHORIZE, params);
        self.call(&request).await?.expect_ok_flag(ID_PRE_AUTHORIZE)
    }

    /// Starts a payment. On approval the transaction is complete, with no
    /// confirmation step. The outcome arrives through
    /// [`KioskClient::subscribe_transactions`].
    pub async fn pay(&self, params: &PaymentParameters) -> Result<(), KioskError> {
        let request = RpcRequest::new(METHOD_PAY_TRANSACTION, ID_PAY_TRANSACTION, params);
        self.call(&request)
            .await?
            .expect_ok_flag(ID_PAY_TRANSACTION)
    }

    /// Confirms a previously pre-authorized transaction.
    pub async fn confirm_transaction(
        &self,
        amount_cents: u32,
        fee_cents: u32,
        product_id: u32,
        transaction_reference: &str,
    ) -> Result<(), KioskError> {
        let request = RpcRequest::new(
            METHOD_CONFIRM_TRANSACTION,
            ID_CONFIRM_TRANSACTION,
            ConfirmParams {
                amount: amount_cents,
                fee: fee_cents,
                product_id,
                transaction_reference,
            },
        );
        self.call(&request)
            .await?
            .expect_ok_flag(ID_CONFIRM_TRANSACTION)
    }

    /// Voids a previously authorized transaction.
    pub async fn void_transaction(&self, transaction_reference: &str) -> Result<(), KioskError> {
        let request = RpcRequest::new(
            METHOD_VOID_TRANSACTION,
            ID_VOID_TRANSACTION,
            VoidParams {
                transaction_reference,
            },
        );
        self.call(&request)
            .await?
            .expect_ok_flag(ID_VOID_TRANSACTION)
    }

    /// Cancels an ongoing payment or pre-authorization. Succeeds when the
    /// kiosk cancelled it or had nothing to cancel; fails with
    /// [`KioskError::Rejected`] when cancellation is no longer possible.
    pub async fn cancel_transaction(&self) -> Result<(), KioskError> {
        let request = RpcRequest::new(
            METHOD_CANCEL_TRANSACTION,
            ID_CANCEL_TRANSACTION,
            EmptyParams {},
        );
        let response = self.call(&request).await?;
        match response.expect_string(ID_CANCEL_TRANSACTION)? {
            "Ok" | "NoTransaction" => Ok(()),
            "CannotCancel" => Err(KioskError::Rejected),
            other => Err(KioskError::parse(format!(
                "unknown CancelTransaction result '{other}'"
            ))),
        }
    }

    /// Stream of transaction outcomes, one per completed payment or
    /// pre-authorization (including failed and cancelled ones).
    pub async fn subscribe_transactions(&self) -> EventStream<PaymentOutcome> {
        self.transactions.subscribe().await
    }

    /// Stream of reader display updates.
    pub async fn subscribe_reader_messages(&self) -> EventStream<ReaderMessage> {
        self.reader_messages.subscribe().await
    }

    async fn version(
        &self,
        component: &'static str,
        id: RequestId,
    ) -> Result<String, KioskError> {
        let request = RpcRequest::new(METHOD_GET_VERSION, id, VersionParams { component });
        let response = self.call(&request).await?;
        Ok(response.expect_string(id)?.to_string())
    }

    async fn call<P: Serialize>(&self, request: &RpcRequest<P>) -> Result<RpcResponse, KioskError> {
        let payload = serde_json::to_vec(request)?;
        self.correlator
            .send_receive(
                &self.command_transport,
                request.id,
                &payload,
                self.response_timeout,
            )
            .await
    }
}

impl Drop for KioskClient {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}
