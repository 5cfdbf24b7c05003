//! Fixed compliance guideline sets, one per modality.

use crate::classify::Modality;

pub const VIDEO_GUIDELINES: &str = "\
1. Use simple, clear language. Avoid technical or medical jargon.
2. Ensure speech is clear and slow enough to understand.
3. Keep volume consistent. Do not let background noise cover the message.
4. Make text match key audio phrases or provide a transcript.
5. Show text long enough for viewers to read easily.
6. Place text in a clear, unobstructed part of the screen.
7. Use strong contrast so text is easy to see (e.g., white on dark background).
8. Use large, easy-to-read font (e.g., sans-serif).
9. Avoid rapid scene changes or distracting animations during key messages.
10. Present honest, balanced information. Do not exaggerate benefits or hide risks.
";

pub const POST_GUIDELINES: &str = "\
1. Make sure the post follows Instagram's community guidelines. Avoid prohibited content.
2. Only share health claims that are true and not misleading.
3. Write clear, simple captions without too much jargon.
4. Use 5-10 relevant hashtags. Avoid overloading the post with hashtags.
5. Show only real and honest testimonials or results.
6. Clearly mark sponsored posts with #ad or #sponsored.
7. Use high-quality images that fit Instagram's feed (1:1 or 4:5 size).
8. Keep text on images minimal and easy to read on mobile.
9. Add image descriptions when needed for accessibility.
10. Give clear calls-to-action without being too pushy.
11. Make sure links work and go to trusted sites.
12. Follow any specific rules for your industry (e.g., pharma, finance).
";

pub const WEBSITE_GUIDELINES: &str = "\
1. Clearly separate content for healthcare professionals and the public, with access controls if needed.
2. Ensure all medical claims follow regulatory guidelines and include proper disclaimers.
3. Show safety info, black box warnings, and contraindications clearly for prescription drugs.
4. Provide easy ways for users to report adverse events.
5. Include clear intended use statements for all medical devices and products.
6. Accurately present clinical data with references to peer-reviewed sources.
7. Use patient testimonials only if they follow regulations and include disclaimers.
8. Keep educational content separate from promotional material as required.
9. Protect patient data according to privacy standards like HIPAA.
10. Do not misuse terms like \"safe\", \"effective\", or \"guaranteed\".
";

/// The guideline set steering the analysis of a modality.
pub fn for_modality(modality: Modality) -> &'static str {
    match modality {
        Modality::Video => VIDEO_GUIDELINES,
        Modality::Post => POST_GUIDELINES,
        Modality::Website => WEBSITE_GUIDELINES,
    }
}

/// Human-readable subject used when assembling prompts.
pub fn subject(modality: Modality) -> &'static str {
    match modality {
        Modality::Video => "video ad",
        Modality::Post => "Instagram post",
        Modality::Website => "website",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_modality_has_guidelines() {
        for modality in [Modality::Video, Modality::Post, Modality::Website] {
            assert!(!for_modality(modality).is_empty());
        }
    }
}
