use crate::fetcher::FetchError;
use crate::name::ValidationError;

error_chain! {
    errors {
        InvalidName(reason: ValidationError) {
            description("invalid name")
            display("invalid name: {}", reason)
        }

        MalformedRecord(reason: String) {
            description("malformed record")
            display("malformed record: {}", reason)
        }

        SignatureMismatch {
            description("signature mismatch")
            display("signature mismatch: record is forged, corrupted, or signed by another key")
        }

        Fetch(reason: FetchError) {
            description("fetch failed")
            display("fetch failed: {}", reason)
        }

        InvalidFormData(reason: String) {
            description("invalid form data")
            display("invalid form data: {}", reason)
        }

        KeyGeneration {
            description("key generation failed")
            display("failed to generate a keypair")
        }

        Config(reason: String) {
            description("bad configuration")
            display("bad configuration: {}", reason)
        }

        MachineStopped {
            description("machine stopped")
            display("the machine task is no longer running")
        }
    }
}

/// Shorthand for a `MalformedRecord` error, used throughout the codec.
pub fn malformed<S: Into<String>>(reason: S) -> Error {
    ErrorKind::MalformedRecord(reason.into()).into()
}

/// Render the whole error chain to a single string
pub fn render_chain(err: &Error) -> String {
    let mut rslt = format!("{}", err);
    for cause in err.iter().skip(1) {
        rslt += &format!(", caused by: {}", cause);
    }
    rslt
}
