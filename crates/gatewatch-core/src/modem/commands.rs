//! Modem commands
//!
//! One function per AT query the agent issues. Each builds a [`Command`],
//! runs it on the [`Executor`] and turns the response into a typed value.

use crate::protocol::{
    default_handler, pin_handler, prefix_handler, Command, Executor, ProtocolError, Reply,
    Transport,
};

use super::NetworkType;

const CSQ_PREFIX: &str = "+CSQ:";
const CNSMOD_PREFIX: &str = "+CNSMOD";
const CCID_PREFIX: &str = "+CCID:";

/// Verbose (text) error reporting level for `AT+CMEE`
pub const CMEE_VERBOSE: u8 = 2;

/// Raw `AT+CSQ` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CsqResult {
    /// RSSI index, 0..=31 or 99
    pub rssi: u8,
    /// Bit error rate index, 0..=7 or 99
    pub ber: u8,
}

/// Plain `AT`: is anything answering on the port
pub async fn at<T: Transport>(executor: &mut Executor<'_, T>) -> Result<(), ProtocolError> {
    executor.execute(Command::new("AT", default_handler())).await
}

/// `ATE1` / `ATE0`: switch command echo on or off
pub async fn ate<T: Transport>(
    executor: &mut Executor<'_, T>,
    echo: bool,
) -> Result<(), ProtocolError> {
    let text = if echo { "ATE1" } else { "ATE0" };
    executor.execute(Command::new(text, default_handler())).await
}

/// `AT+CMEE=<level>`: choose how the modem reports errors
pub async fn cmee<T: Transport>(
    executor: &mut Executor<'_, T>,
    level: u8,
) -> Result<(), ProtocolError> {
    executor
        .execute(Command::new(format!("AT+CMEE={}", level), default_handler()))
        .await
}

/// `AT+CPIN?`: `Ok` when the SIM is ready, a [`SimError`](crate::protocol::SimError)
/// carrying the lock state otherwise
pub async fn cpin<T: Transport>(executor: &mut Executor<'_, T>) -> Result<(), ProtocolError> {
    executor
        .execute(Command::new("AT+CPIN?", pin_handler()))
        .await
}

/// `AT+CSQ`: raw signal quality
pub async fn csq<T: Transport>(executor: &mut Executor<'_, T>) -> Result<CsqResult, ProtocolError> {
    let mut parsed = None;
    let command = Command::new(
        "AT+CSQ",
        prefix_handler(CSQ_PREFIX, |line: &str| {
            parsed = Some(parse_csq(line));
            Reply::NeedMore
        }),
    )
    .draining();
    executor.execute(command).await?;

    match parsed {
        Some(Some(result)) => Ok(result),
        Some(None) => Err(ProtocolError::parse("AT+CSQ", "expected +CSQ: <rssi>,<ber>")),
        None => Err(ProtocolError::parse("AT+CSQ", "no +CSQ line before OK")),
    }
}

/// `AT+CNSMOD?`: network generation
pub async fn cnsmod<T: Transport>(
    executor: &mut Executor<'_, T>,
) -> Result<NetworkType, ProtocolError> {
    let mut network = NetworkType::NoNetwork;
    let command = Command::new(
        "AT+CNSMOD?",
        prefix_handler(CNSMOD_PREFIX, |line: &str| {
            network = parse_cnsmod(line);
            Reply::NeedMore
        }),
    )
    .draining();
    executor.execute(command).await?;
    Ok(network)
}

/// `AT+CCID`: the SIM's ICCID
pub async fn ccid<T: Transport>(executor: &mut Executor<'_, T>) -> Result<String, ProtocolError> {
    let mut iccid = None;
    let command = Command::new(
        "AT+CCID",
        prefix_handler(CCID_PREFIX, |line: &str| {
            iccid = Some(ccid_from_line(line));
            Reply::NeedMore
        }),
    )
    .draining();
    executor.execute(command).await?;

    iccid.ok_or_else(|| ProtocolError::parse("AT+CCID", "no +CCID line before OK"))
}

/// Parse `+CSQ: <rssi>,<ber>`; non-numeric fields read as 0
pub fn parse_csq(line: &str) -> Option<CsqResult> {
    let values = line.strip_prefix(CSQ_PREFIX).unwrap_or(line);
    let mut fields = values.split(',').map(|f| f.trim().parse::<u8>().unwrap_or(0));
    let rssi = fields.next()?;
    let ber = fields.next()?;
    Some(CsqResult { rssi, ber })
}

/// Parse `+CNSMOD: <n>,<stat>`
pub fn parse_cnsmod(line: &str) -> NetworkType {
    line.split(',')
        .nth(1)
        .and_then(|stat| stat.trim().parse::<i32>().ok())
        .map(NetworkType::from_cnsmod)
        .unwrap_or_default()
}

/// Extract the ICCID from `+CCID: "<iccid>"`, dropping one pair of quotes
pub fn ccid_from_line(line: &str) -> String {
    let first = line.split(',').next().unwrap_or(line);
    let token = first.strip_prefix(CCID_PREFIX).unwrap_or(first).trim();
    let token = token.strip_prefix('"').unwrap_or(token);
    token.strip_suffix('"').unwrap_or(token).to_string()
}
