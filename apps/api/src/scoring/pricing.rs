use std::collections::HashMap;

pub const EMAIL: &str = "email";
pub const TRAVEL_DESTINATIONS: &str = "travel_destinations";
pub const DAILY_IP: &str = "daily_ip";
pub const FUNERAL_SCHEDULED: &str = "funeral_scheduled";

/// Ledger types written by the server itself; clients may not sell them directly.
pub const RESERVED_TYPES: &[&str] = &[EMAIL, DAILY_IP, FUNERAL_SCHEDULED];

/// Social handles shown on the leaderboard.
pub const SOCIAL_TYPES: &[&str] = &[
    "twitter_handle",
    "instagram_username",
    "facebook_name",
    "youtube_channel",
    "fb_messenger",
    "whatsapp",
    "telegram",
    "tiktok",
    "discord",
    "reddit",
    "linkedin",
    "snapchat",
];

const STANDARD_PRICES: &[(&str, i64)] = &[
    // technical
    ("ip_address", 10),
    ("browser", 5),
    ("user_agent", 5),
    ("http_accept", 5),
    ("http_accept_language", 5),
    ("http_accept_encoding", 5),
    ("http_referer", 10),
    ("proxy_x_forwarded", 15),
    ("proxy_via", 15),
    ("browser_details", 10),
    ("screen_size", 10),
    ("plugins", 15),
    ("canvas_fingerprint", 20),
    ("timezone", 5),
    ("language", 5),
    ("platform", 5),
    // preferences
    ("favorite_food", 60),
    ("favorite_movie", 70),
    ("favorite_book", 70),
    ("hobbies", 80),
    ("favorite_sport", 50),
    ("favorite_school_subject", 50),
    ("favorite_childhood_memory", 50),
    ("pet_name", 50),
    // contact and social
    ("phone_number", 100),
    ("location", 20),
    ("twitter_handle", 80),
    ("instagram_username", 85),
    ("facebook_name", 1000),
    ("youtube_channel", 1000),
    ("fb_messenger", 1200),
    ("whatsapp", 1200),
    ("telegram", 1200),
    ("tiktok", 1500),
    ("discord", 1500),
    ("reddit", 100),
    ("linkedin", 120),
    ("snapchat", 80),
    // demographics
    ("gender", 50),
    ("marital_status", 75),
    ("occupation", 100),
    ("education_level", 75),
    ("nationality", 50),
    // beliefs and identity
    ("political_affiliation", 1850),
    ("religious_beliefs", 1650),
    ("sexual_orientation", 2000),
    ("dating_preferences", 750),
    // financial
    ("credit_card_last4", 200),
    ("full_credit_card_number", 5000),
    ("credit_card_expiry_date", 2500),
    ("credit_card_cvv", 7500),
    ("bank_account", 3000),
    ("bank_account_sort_code", 3500),
    ("paypal_email", 150),
    ("crypto_wallet_address", 300),
    ("annual_income", 250),
    ("credit_score", 500),
    ("investment_portfolio", 1000),
    // health
    ("medical_conditions", 500),
    ("blood_type", 400),
    ("allergies", 350),
    ("insurance_provider", 150),
    ("prescription_medications", 450),
    ("vaccination_records", 300),
    ("mental_health_history", 4000),
    // identity documents
    ("ssn_full", 10000),
    ("passport_number", 500),
    ("driver_license_number", 500),
    ("dna_results", 1000),
    // security questions
    ("first_pet", 2000),
    ("mothers_maiden", 2500),
    ("street_grew_up", 3000),
    ("childhood_friend", 3500),
    ("mothers_birthday", 4000),
    ("favorite_teacher", 4500),
    ("city_born", 5000),
    ("mothers_city_born", 5000),
    // location
    ("week_location", 500),
    ("home_location", 500),
    ("work_location", 2500),
    ("favorite_hangout_spots", 250),
    ("travel_history", 200),
    (TRAVEL_DESTINATIONS, 100),
    // behavioural
    ("shopping_habits", 100),
    // engagement
    ("favorite_date_activity", 50),
    ("favorite_sex_position", 1000),
    ("favorite_jolly_rancher_color", 1000),
    ("current_video_game_addiction", 1000),
    ("surprise_data", 1000),
];

/// Static mapping from data type to its sale price in points.
#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: HashMap<&'static str, i64>,
}

impl PriceTable {
    pub fn standard() -> Self {
        Self {
            prices: STANDARD_PRICES.iter().copied().collect(),
        }
    }

    /// `None` for types outside the table; callers apply their own default.
    pub fn price_of(&self, data_type: &str) -> Option<i64> {
        self.prices.get(data_type).copied()
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::standard()
    }
}

pub fn is_reserved(data_type: &str) -> bool {
    RESERVED_TYPES.contains(&data_type)
}
