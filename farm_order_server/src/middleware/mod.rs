mod webhook_signature;

pub use webhook_signature::{verify_webhook_signature, SignatureError, WebhookSignature, WebhookSignatureService};
