//! TLV tag identifiers.

use std::fmt;

macro_rules! tags {
    ($($name:ident = $code:literal,)+) => {
        /// Tag of an optional Tag-Length-Value parameter.
        ///
        /// Tags are carried through untouched; tags outside the table are
        /// preserved as `Other`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Tag {
            $($name,)+
            Other(u16),
        }

        impl Tag {
            /// Wire code of this tag.
            pub fn code(self) -> u16 {
                match self {
                    $(Tag::$name => $code,)+
                    Tag::Other(code) => code,
                }
            }
        }

        impl From<u16> for Tag {
            fn from(code: u16) -> Self {
                match code {
                    $($code => Tag::$name,)+
                    other => Tag::Other(other),
                }
            }
        }
    };
}

tags! {
    DestAddrSubunit = 0x0005,
    DestNetworkType = 0x0006,
    DestBearerType = 0x0007,
    DestTelematicsId = 0x0008,
    SourceAddrSubunit = 0x000D,
    SourceNetworkType = 0x000E,
    SourceBearerType = 0x000F,
    SourceTelematicsId = 0x0010,
    QosTimeToLive = 0x0017,
    PayloadType = 0x0019,
    AdditionalStatusInfoText = 0x001D,
    ReceiptedMessageId = 0x001E,
    MsMsgWaitFacilities = 0x0030,
    PrivacyIndicator = 0x0201,
    SourceSubaddress = 0x0202,
    DestSubaddress = 0x0203,
    UserMessageReference = 0x0204,
    UserResponseCode = 0x0205,
    SourcePort = 0x020A,
    DestinationPort = 0x020B,
    SarMsgRefNum = 0x020C,
    LanguageIndicator = 0x020D,
    SarTotalSegments = 0x020E,
    SarSegmentSeqnum = 0x020F,
    CallbackNumPresInd = 0x0302,
    CallbackNumAtag = 0x0303,
    NumberOfMessages = 0x0304,
    CallbackNum = 0x0381,
    DpfResult = 0x0420,
    SetDpf = 0x0421,
    MsAvailabilityStatus = 0x0422,
    NetworkErrorCode = 0x0423,
    MessagePayload = 0x0424,
    DeliveryFailureReason = 0x0425,
    MoreMessagesToSend = 0x0426,
    MessageStateOption = 0x0427,
    UssdServiceOp = 0x0501,
    DisplayTime = 0x1201,
    SmsSignal = 0x1203,
    MsValidity = 0x1204,
    AlertOnMessageDelivery = 0x130C,
    ItsReplyType = 0x1380,
    ItsSessionInfo = 0x1383,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_codes() {
        assert_eq!(Tag::from(0x0424), Tag::MessagePayload);
        assert_eq!(Tag::SarTotalSegments.code(), 0x020E);
        assert_eq!(Tag::from(0x1400), Tag::Other(0x1400));
        assert_eq!(Tag::Other(0x1400).code(), 0x1400);
    }
}
