use rand::Rng;

use crate::models::{Emotion, Gender, PersonalityInsights};

/// Template banks carried over from the original service. Content is
/// deliberately tongue-in-cheek; the only contract is the score banding.

pub fn achievements_for(score: f64) -> &'static [&'static str] {
    if score >= 9.0 {
        &[
            "👑 Future K-pop Idol",
            "🏆 Beauty Pageant Winner",
            "⭐ Most Popular in School",
            "💫 Instagram Influencer Potential",
        ]
    } else if score >= 8.0 {
        &[
            "🎭 Drama Club Star",
            "📸 Model Material",
            "👥 Class President Material",
            "💝 Most Likely to Get 20+ Crushes",
        ]
    } else if score >= 7.0 {
        &[
            "📚 Future Tutor",
            "🎨 Creative Genius",
            "🤝 Natural Leader",
            "💕 Relationship Expert",
        ]
    } else if score >= 6.0 {
        &[
            "🎯 Goal Achiever",
            "🌟 Hidden Talent",
            "💪 Confidence Builder",
            "🎪 Life of the Party",
        ]
    } else {
        &[
            "💎 Diamond in the Rough",
            "🌱 Growth Mindset",
            "🎭 Character Actor",
            "💫 Late Bloomer",
        ]
    }
}

pub fn traits_for(age: u32) -> &'static [&'static str] {
    if age < 20 {
        &[
            "🎓 Academic Excellence",
            "🚀 Ambitious Dreamer",
            "🎵 Trendsetter",
            "💡 Innovative Thinker",
        ]
    } else if age < 30 {
        &[
            "💼 Career Climber",
            "🌍 World Traveler",
            "🎯 Goal-Oriented",
            "💪 Confident Leader",
        ]
    } else {
        &[
            "🧠 Wise Mentor",
            "🏠 Life Experience",
            "💎 Mature Beauty",
            "🌟 Inspirational Figure",
        ]
    }
}

pub fn predictions_for(score: f64) -> &'static [&'static str] {
    if score >= 8.5 {
        &[
            "🌟 Will become a famous celebrity",
            "💍 Will have the most romantic proposals",
            "🏆 Will win multiple awards",
            "📱 Will have 1M+ social media followers",
        ]
    } else if score >= 7.5 {
        &[
            "💼 Will be a successful entrepreneur",
            "🎭 Will star in movies/TV shows",
            "💕 Will have amazing relationships",
            "🌍 Will travel the world",
        ]
    } else {
        &[
            "💎 Will discover hidden talents",
            "🎯 Will achieve personal goals",
            "💪 Will overcome challenges",
            "🌟 Will inspire others",
        ]
    }
}

pub fn fun_facts_for(emotion: Option<Emotion>) -> &'static [&'static str] {
    match emotion {
        Some(Emotion::Happy) => &[
            "😊 Your smile lights up every room",
            "🎉 You're the life of every party",
            "💫 Positive energy radiates from you",
            "🌟 You make everyone around you happy",
        ],
        Some(Emotion::Neutral) | None => &[
            "🎭 You have a mysterious aura",
            "💎 You're like a hidden gem",
            "🌙 You have a calm, peaceful presence",
            "🎯 You're focused and determined",
        ],
        _ => &[
            "🎨 You have artistic depth",
            "💭 You're a deep thinker",
            "🎪 You have dramatic flair",
            "💫 You're intriguing and complex",
        ],
    }
}

pub fn gender_facts(gender: Gender) -> &'static [&'static str] {
    match gender {
        Gender::Male => &[
            "💪 You have strong leadership qualities",
            "🎯 You're goal-oriented and ambitious",
            "🛡️ You're protective and caring",
            "🌟 You have natural charisma",
        ],
        Gender::Female => &[
            "💎 You have elegant beauty",
            "🎭 You're graceful and poised",
            "💕 You have a warm, caring nature",
            "✨ You're naturally charming",
        ],
        Gender::Unknown => &[],
    }
}

/// Returned on a 400 when the upload decodes but nothing useful can be
/// made of it.
pub const NO_DETECTION_MESSAGES: [&str; 4] = [
    "Hmm, we couldn't find a face in there! 🧐 Try a clearer photo!",
    "Our AI squinted really hard and saw nothing! 👀 Another photo maybe?",
    "That photo kept its secrets! 🔍 Try one with a face front and center!",
    "No face found! 🙈 A well-lit selfie works best!",
];

/// Returned on a 500; the real error only ever goes to the logs.
pub const INTERNAL_ERROR_MESSAGES: [&str; 5] = [
    "Oops! Our AI had a brain fart! 🤯 Please try again with a different image!",
    "Our AI is having a bad day! 😤 Maybe try a different photo?",
    "Something went wrong in our AI's head! 🧠 Please try again!",
    "Our AI is being dramatic today! 😅 Try uploading a different image!",
    "Our AI says 'I give up!' 🙈 Please try with a different photo!",
];

pub fn pick(messages: &[&'static str]) -> &'static str {
    messages[rand::rng().random_range(0..messages.len())]
}

/// One templated sentence per score band, interpolating an achievement.
pub fn fun_comment(score: f64, achievement: &str) -> String {
    if score >= 9.0 {
        format!(
            "🔥 WOW! You've got SERIOUS star potential! You'd definitely win first place on any audition show! 👑💫 {} material right here!",
            achievement
        )
    } else if score >= 8.0 {
        format!(
            "🌟 AMAZING! You're absolutely stunning! {} vibes all the way! ✨💖",
            achievement
        )
    } else if score >= 7.0 {
        format!(
            "💫 Fantastic! You have such natural beauty! {} potential for sure! 🌟",
            achievement
        )
    } else if score >= 6.0 {
        format!(
            "✨ Great! You have a unique and attractive look! {} in your future! 💪",
            achievement
        )
    } else {
        format!(
            "💎 Beautiful! You have a special kind of charm! {} waiting to happen! 🌱",
            achievement
        )
    }
}

/// The fully local insight generator; also the fallback when every
/// remote provider is unavailable.
pub fn local_insights(
    age: u32,
    gender: Gender,
    score: f64,
    emotion: Option<Emotion>,
) -> PersonalityInsights {
    let mut fun_facts: Vec<String> =
        fun_facts_for(emotion).iter().map(|s| s.to_string()).collect();
    fun_facts.extend(gender_facts(gender).iter().map(|s| s.to_string()));

    PersonalityInsights {
        achievements: achievements_for(score).iter().map(|s| s.to_string()).collect(),
        personality_traits: traits_for(age).iter().map(|s| s.to_string()).collect(),
        future_predictions: predictions_for(score).iter().map(|s| s.to_string()).collect(),
        fun_facts,
    }
}
