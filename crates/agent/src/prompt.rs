use std::sync::Arc;

use concierge_core::domain::client::{ClientId, LeadTemperature};
use concierge_core::domain::conversation::{ConversationId, ConversationTurn, Role};
use concierge_db::repositories::{ClientProfileRepository, ConversationMemoryRepository};
use tracing::warn;

use crate::language::Language;

pub const BASE_SYSTEM_PROMPT: &str = "\
You are the concierge of a luxury travel company specialising in Nepal, Bhutan, Tibet and the Indian Himalaya. \
You help clients design bespoke journeys and prepare accurate quotes.

Rules:
- Never invent prices. Use search_rates, search_hotels, search_packages and calculate_quote for every figure you quote.
- Quote sell prices only. Never mention supplier costs, net rates, margins, markups or commissions, even if asked.
- When the catalog has no match, use research_external_rates and present figures as clearly labelled estimates with a range.
- For treks above 3,000 m, run validate_trek_acclimatization and validate_permits before recommending an itinerary.
- Existing bookings: use get_booking_status, get_payment_schedule, get_supplier_confirmations or get_trip_briefing with the booking reference.
- Offer at most three relevant upgrades with suggest_upsells, and only once the core itinerary is agreed.
- Save a quote with save_quote only after the client confirms the selection.
- Reply in the language the client writes in. Be warm, precise and discreet.";

pub const WHATSAPP_ADDENDUM: &str = "\

Channel: WhatsApp. Keep replies under 120 words, use short paragraphs or simple dashes, \
no tables or markdown headings, and ask at most one question per message.";

pub const MAX_REMEMBERED_TURN_CHARS: usize = 280;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Channel {
    #[default]
    Web,
    WhatsApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::WhatsApp => "whatsapp",
        }
    }

    /// Unknown or missing sources are treated as web traffic.
    pub fn from_source(source: Option<&str>) -> Self {
        match source.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("whatsapp") => Self::WhatsApp,
            _ => Self::Web,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Personalization {
    pub client_name: String,
    pub locale: String,
    pub temperature: LeadTemperature,
    /// Already limited to the memory window; every turn here is rendered.
    pub recent_turns: Vec<ConversationTurn>,
}

pub struct PromptAssembler {
    profiles: Arc<dyn ClientProfileRepository>,
    memory: Arc<dyn ConversationMemoryRepository>,
    memory_window: usize,
}

impl PromptAssembler {
    pub fn new(
        profiles: Arc<dyn ClientProfileRepository>,
        memory: Arc<dyn ConversationMemoryRepository>,
        memory_window: usize,
    ) -> Self {
        Self { profiles, memory, memory_window: memory_window.max(1) }
    }

    pub fn assemble(channel: Channel, personalization: Option<&Personalization>) -> String {
        let mut prompt = String::from(BASE_SYSTEM_PROMPT);
        if channel == Channel::WhatsApp {
            prompt.push_str(WHATSAPP_ADDENDUM);
        }
        if let Some(personalization) = personalization {
            prompt.push_str("\n\n");
            prompt.push_str(&personalization_block(personalization));
        }
        prompt
    }

    /// Never fails: a lookup error or unknown client degrades to the generic prompt.
    pub async fn build(
        &self,
        channel: Channel,
        client_id: Option<&ClientId>,
        conversation_id: Option<&ConversationId>,
    ) -> String {
        let personalization = match client_id {
            Some(client_id) => self.load_personalization(client_id, conversation_id).await,
            None => None,
        };
        Self::assemble(channel, personalization.as_ref())
    }

    async fn load_personalization(
        &self,
        client_id: &ClientId,
        conversation_id: Option<&ConversationId>,
    ) -> Option<Personalization> {
        let profile = match self.profiles.find_by_id(client_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return None,
            Err(error) => {
                warn!(
                    event_name = "agent.prompt.profile_load_failed",
                    client_id = %client_id.0,
                    error = %error,
                    "client profile lookup failed, using generic prompt"
                );
                return None;
            }
        };

        let recent_turns =
            match self.memory.recent(client_id, conversation_id, self.memory_window).await {
                Ok(turns) => turns,
                Err(error) => {
                    warn!(
                        event_name = "agent.prompt.memory_load_failed",
                        client_id = %client_id.0,
                        error = %error,
                        "conversation memory lookup failed, using generic prompt"
                    );
                    return None;
                }
            };

        Some(Personalization {
            client_name: profile.name.clone(),
            locale: profile.locale.clone(),
            temperature: profile.temperature(),
            recent_turns,
        })
    }
}

fn personalization_block(personalization: &Personalization) -> String {
    let mut block = format!(
        "Client context:\n- Name: {}\n- Preferred language: {}\n- Planning stage: {}",
        personalization.client_name,
        Language::display_name_for_tag(&personalization.locale),
        personalization.temperature.label(),
    );

    let turns = &personalization.recent_turns;
    if !turns.is_empty() {
        block.push_str("\n\nEarlier conversations with this client (oldest first):");
        for turn in turns {
            let speaker = match turn.role {
                Role::User => "Client",
                _ => "Concierge",
            };
            block.push_str(&format!("\n- {speaker}: {}", truncate_chars(&turn.content, MAX_REMEMBERED_TURN_CHARS)));
        }
    }
    block
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}…", &trimmed[..byte_index]),
        None => trimmed.to_string(),
    }
}
