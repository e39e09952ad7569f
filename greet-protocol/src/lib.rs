use std::fmt;

use serde::{Deserialize, Serialize};

include!(concat!(env!("OUT_DIR"), "/greet.GreetService.rs"));

/// Default port for greet servers
pub const DEFAULT_PORT: u16 = 50051;

/// Name of the person to greet
#[derive(Clone, PartialEq, Eq, Hash, prost::Message, Deserialize, Serialize)]
pub struct Greeting {
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub first_name: String,
    #[prost(string, tag = "2")]
    #[serde(default)]
    pub last_name: String,
}

impl Greeting {
    pub fn new<F: Into<String>, L: Into<String>>(first_name: F, last_name: L) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    pub fn first_name<F: Into<String>>(first_name: F) -> Self {
        Self::new(first_name, String::new())
    }
}

impl fmt::Display for Greeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => write!(f, "{} {}", self.first_name, self.last_name),
            (false, true) => f.write_str(&self.first_name),
            (true, _) => f.write_str(&self.last_name),
        }
    }
}

/// Access to the text carried by every greet response
pub trait GreetResult {
    fn result(&self) -> &str;
}

macro_rules! greeting_request {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, prost::Message)]
        pub struct $name {
            #[prost(message, optional, tag = "1")]
            pub greeting: Option<Greeting>,
        }

        impl From<Greeting> for $name {
            fn from(greeting: Greeting) -> Self {
                Self {
                    greeting: Some(greeting),
                }
            }
        }
    };
}

macro_rules! greeting_response {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, prost::Message)]
        pub struct $name {
            #[prost(string, tag = "1")]
            pub result: String,
        }

        impl GreetResult for $name {
            fn result(&self) -> &str {
                &self.result
            }
        }
    };
}

greeting_request!(GreetRequest);
greeting_response!(GreetResponse);

greeting_request!(GreetManyTimesRequest);
greeting_response!(GreetManyTimesResponse);

greeting_request!(
    /// One entry of a client stream; the server answers once the stream is closed
    LongGreetRequest
);
greeting_response!(LongGreetResponse);

greeting_request!(GreetEveryoneRequest);
greeting_response!(GreetEveryoneResponse);

#[cfg(test)]
mod test {
    use prost::Message;

    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            Greeting::new("Artha", "Prihardana").to_string(),
            "Artha Prihardana"
        );
        assert_eq!(Greeting::first_name("Lucy").to_string(), "Lucy");
        assert_eq!(Greeting::new("", "Prihardana").to_string(), "Prihardana");
        assert_eq!(Greeting::default().to_string(), "");
    }

    #[test]
    fn request_wire_layout() {
        let request = GreetEveryoneRequest::from(Greeting::first_name("Lucy"));
        assert_eq!(
            request.encode_to_vec(),
            vec![0x0a, 0x06, 0x0a, 0x04, b'L', b'u', b'c', b'y']
        );

        // All request shapes share the same layout
        let decoded = LongGreetRequest::decode(request.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.greeting, Some(Greeting::first_name("Lucy")));
    }

    #[test]
    fn deserialize_partial_greeting() {
        let g: Greeting = serde_json::from_str(r#"{ "first_name": "Stephane" }"#).unwrap();
        assert_eq!(g, Greeting::first_name("Stephane"));

        let g: Greeting =
            serde_json::from_str(r#"{ "first_name": "Artha", "last_name": "Prihardana" }"#)
                .unwrap();
        assert_eq!(g, Greeting::new("Artha", "Prihardana"));
    }

    #[test]
    fn response_result() {
        let response = GreetManyTimesResponse {
            result: "Hello Artha number 1".to_string(),
        };
        assert_eq!(response.result(), "Hello Artha number 1");
    }
}
