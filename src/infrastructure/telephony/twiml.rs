//! Signaling markup (TwiML) builder
//!
//! Builds the XML response documents that instruct the telephony provider
//! how to handle a call leg: speak an announcement, hang up, dial a number
//! directly, or join a named conference with per-leg flags.

use crate::domain::bridge::{ConferenceJoin, MAX_PARTICIPANTS};

/// Options for joining a conference bridge
#[derive(Debug, Clone)]
pub struct ConferenceOptions {
    pub name: String,
    pub join: ConferenceJoin,
    /// Hold audio played while the bridge has not started
    pub wait_url: Option<String>,
    /// Where conference events (start/end/join/leave) are posted
    pub status_callback: Option<String>,
    pub beep: bool,
    pub max_participants: u32,
}

impl ConferenceOptions {
    pub fn new(name: String, join: ConferenceJoin) -> Self {
        Self {
            name,
            join,
            wait_url: None,
            status_callback: None,
            beep: false,
            max_participants: MAX_PARTICIPANTS,
        }
    }

    pub fn with_wait_url(mut self, url: String) -> Self {
        self.wait_url = Some(url);
        self
    }

    pub fn with_status_callback(mut self, url: String) -> Self {
        self.status_callback = Some(url);
        self
    }
}

/// Options for a direct `<Dial><Number>` leg
#[derive(Debug, Clone, Default)]
pub struct DialOptions {
    pub caller_id: Option<String>,
    pub record: Option<String>,
    pub recording_status_callback: Option<String>,
}

#[derive(Debug, Clone)]
enum Verb {
    Say { voice: Option<String>, text: String },
    Hangup,
    DialNumber { options: DialOptions, number: String },
    DialConference(ConferenceOptions),
}

/// Voice response document builder
#[derive(Debug, Clone, Default)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self { verbs: Vec::new() }
    }

    /// Speak an announcement
    pub fn say(mut self, text: &str) -> Self {
        self.verbs.push(Verb::Say {
            voice: None,
            text: text.to_string(),
        });
        self
    }

    /// Speak an announcement with a specific voice
    pub fn say_voice(mut self, voice: &str, text: &str) -> Self {
        self.verbs.push(Verb::Say {
            voice: Some(voice.to_string()),
            text: text.to_string(),
        });
        self
    }

    /// Terminate the leg
    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Dial a phone number directly (client-device direct-dial flow)
    pub fn dial_number(mut self, options: DialOptions, number: &str) -> Self {
        self.verbs.push(Verb::DialNumber {
            options,
            number: number.to_string(),
        });
        self
    }

    /// Place the leg into a named conference
    pub fn dial_conference(mut self, options: ConferenceOptions) -> Self {
        self.verbs.push(Verb::DialConference(options));
        self
    }

    /// Render the response document
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
        for verb in &self.verbs {
            match verb {
                Verb::Say { voice, text } => {
                    match voice {
                        Some(voice) => {
                            xml.push_str(&format!(
                                "<Say voice=\"{}\">{}</Say>",
                                escape(voice),
                                escape(text)
                            ));
                        }
                        None => xml.push_str(&format!("<Say>{}</Say>", escape(text))),
                    }
                }
                Verb::Hangup => xml.push_str("<Hangup/>"),
                Verb::DialNumber { options, number } => {
                    xml.push_str("<Dial");
                    if let Some(caller_id) = &options.caller_id {
                        xml.push_str(&format!(" callerId=\"{}\"", escape(caller_id)));
                    }
                    if let Some(record) = &options.record {
                        xml.push_str(&format!(" record=\"{}\"", escape(record)));
                    }
                    if let Some(url) = &options.recording_status_callback {
                        xml.push_str(&format!(
                            " recordingStatusCallback=\"{}\" recordingStatusCallbackMethod=\"POST\"",
                            escape(url)
                        ));
                    }
                    xml.push_str(&format!("><Number>{}</Number></Dial>", escape(number)));
                }
                Verb::DialConference(conf) => {
                    xml.push_str("<Dial><Conference");
                    xml.push_str(&format!(
                        " startConferenceOnEnter=\"{}\" endConferenceOnExit=\"{}\" beep=\"{}\"",
                        conf.join.start_on_enter, conf.join.end_on_exit, conf.beep
                    ));
                    if let Some(url) = &conf.wait_url {
                        xml.push_str(&format!(" waitUrl=\"{}\" waitMethod=\"GET\"", escape(url)));
                    }
                    if let Some(url) = &conf.status_callback {
                        xml.push_str(&format!(
                            " statusCallback=\"{}\" statusCallbackMethod=\"POST\" statusCallbackEvent=\"start end join leave\"",
                            escape(url)
                        ));
                    }
                    xml.push_str(&format!(" maxParticipants=\"{}\"", conf.max_participants));
                    xml.push_str(&format!(">{}</Conference></Dial>", escape(&conf.name)));
                }
            }
        }
        xml.push_str("</Response>");
        xml
    }
}

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bridge::{join_policy, LegRole};

    #[test]
    fn test_say_and_hangup() {
        let xml = VoiceResponse::new()
            .say("Sorry, all agents are currently busy. Please try again later.")
            .hangup()
            .to_xml();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>"));
        assert!(xml.contains("<Say>Sorry, all agents are currently busy."));
        assert!(xml.contains("<Hangup/>"));
        assert!(xml.ends_with("</Response>"));
    }

    #[test]
    fn test_customer_conference_flags() {
        let options = ConferenceOptions::new(
            "conf_15550001_CA01".to_string(),
            join_policy(LegRole::Customer),
        )
        .with_wait_url("https://example.com/hold".to_string());

        let xml = VoiceResponse::new().dial_conference(options).to_xml();

        assert!(xml.contains("startConferenceOnEnter=\"false\""));
        assert!(xml.contains("endConferenceOnExit=\"true\""));
        assert!(xml.contains("waitUrl=\"https://example.com/hold\""));
        assert!(xml.contains("maxParticipants=\"2\""));
        assert!(xml.contains(">conf_15550001_CA01</Conference>"));
    }

    #[test]
    fn test_agent_conference_flags() {
        let options = ConferenceOptions::new(
            "conf_15550001_CA01".to_string(),
            join_policy(LegRole::Agent),
        );

        let xml = VoiceResponse::new().dial_conference(options).to_xml();

        assert!(xml.contains("startConferenceOnEnter=\"true\""));
        assert!(xml.contains("endConferenceOnExit=\"false\""));
    }

    #[test]
    fn test_dial_number_with_caller_id() {
        let options = DialOptions {
            caller_id: Some("+15551000".to_string()),
            record: Some("record-from-answer".to_string()),
            recording_status_callback: Some("https://example.com/rec".to_string()),
        };

        let xml = VoiceResponse::new().dial_number(options, "+15550002").to_xml();

        assert!(xml.contains("callerId=\"+15551000\""));
        assert!(xml.contains("record=\"record-from-answer\""));
        assert!(xml.contains("<Number>+15550002</Number>"));
    }

    #[test]
    fn test_xml_escaping() {
        let xml = VoiceResponse::new().say("Tom & \"Jerry\" <live>").to_xml();
        assert!(xml.contains("Tom &amp; &quot;Jerry&quot; &lt;live&gt;"));
    }
}
