//! Application-level status codes.

use std::fmt;

use crate::pdu::CommandStatus;

macro_rules! status_codes {
    ($($name:ident = $code:literal => $text:literal,)+) => {
        /// Outcome of a submitted message.
        ///
        /// Exactly one status is carried per response. Codes the peer sends
        /// that are not in this table collapse into [`Status::UnknownError`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Status {
            $($name,)+
        }

        impl Status {
            /// Wire code of this status.
            pub fn code(self) -> u32 {
                match self {
                    $(Status::$name => $code,)+
                }
            }

            /// Map a wire code to a status, falling back to `UnknownError`.
            pub fn from_code(code: u32) -> Status {
                match code {
                    $($code => Status::$name,)+
                    _ => Status::UnknownError,
                }
            }

            fn description(self) -> &'static str {
                match self {
                    $(Status::$name => $text,)+
                }
            }
        }
    };
}

status_codes! {
    Ok = 0x0000_0000 => "ok",
    InvalidPriorityFlag = 0x0000_0006 => "invalid priority flag",
    InvalidRegisteredDeliveryFlag = 0x0000_0007 => "invalid registered delivery flag",
    SystemError = 0x0000_0008 => "system error",
    InvalidSourceAddress = 0x0000_000A => "invalid source address",
    InvalidDestinationAddress = 0x0000_000B => "invalid destination address",
    InvalidMessageId = 0x0000_000C => "invalid message id",
    CancelSmFailed = 0x0000_0011 => "cancel_sm failed",
    ReplaceSmFailed = 0x0000_0013 => "replace_sm failed",
    MessageQueueFull = 0x0000_0014 => "message queue full",
    InvalidServiceType = 0x0000_0015 => "invalid service type",
    InvalidNumberOfDestinations = 0x0000_0033 => "invalid number of destinations",
    InvalidDistributionListName = 0x0000_0034 => "invalid distribution list name",
    InvalidDestinationFlag = 0x0000_0040 => "invalid destination flag",
    InvalidSubmitWithReplaceRequest = 0x0000_0042 => "invalid submit with replace request",
    InvalidEsmClassFieldData = 0x0000_0043 => "invalid esm_class field data",
    CannotSubmitToDistList = 0x0000_0044 => "cannot submit to distribution list",
    SubmitSmFailed = 0x0000_0045 => "submit_sm failed",
    InvalidSourceAddressTon = 0x0000_0048 => "invalid source address TON",
    InvalidSourceAddressNpi = 0x0000_0049 => "invalid source address NPI",
    InvalidDestinationAddressTon = 0x0000_0050 => "invalid destination address TON",
    InvalidDestinationAddressNpi = 0x0000_0051 => "invalid destination address NPI",
    InvalidSystemType = 0x0000_0053 => "invalid system type",
    InvalidReplaceIfPresentFlag = 0x0000_0054 => "invalid replace_if_present flag",
    InvalidNumberOfMessages = 0x0000_0055 => "invalid number of messages",
    ThrottlingError = 0x0000_0058 => "throttling error",
    InvalidScheduledDeliveryTime = 0x0000_0061 => "invalid scheduled delivery time",
    InvalidMessageValidityTime = 0x0000_0062 => "invalid message validity period",
    PredefinedMessageInvalidOrNotFound = 0x0000_0063 => "predefined message invalid or not found",
    EsmeReceiverTemporaryAppError = 0x0000_0064 => "ESME receiver temporary app error",
    EsmeReceiverPermanentAppError = 0x0000_0065 => "ESME receiver permanent app error",
    EsmeReceiverRejectMessageError = 0x0000_0066 => "ESME receiver reject message error",
    QuerySmFailed = 0x0000_0067 => "query_sm failed",
    OptionalParameterNotAllowed = 0x0000_00C1 => "optional parameter not allowed",
    InvalidParameterLength = 0x0000_00C2 => "invalid parameter length",
    ExpectedOptionalParameterMissing = 0x0000_00C3 => "expected optional parameter missing",
    InvalidOptionalParameterValue = 0x0000_00C4 => "invalid optional parameter value",
    UnknownError = 0x0000_00FF => "unknown error",
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.description(), self.code())
    }
}

impl From<Status> for CommandStatus {
    fn from(status: Status) -> Self {
        CommandStatus(status.code())
    }
}

impl From<CommandStatus> for Status {
    fn from(status: CommandStatus) -> Self {
        Status::from_code(status.0)
    }
}
