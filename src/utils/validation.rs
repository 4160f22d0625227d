use validator::ValidationError;

/// At least eight characters mixing letters and digits.
pub fn password_strength(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= 8;
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if long_enough && has_letter && has_digit {
        Ok(())
    } else {
        let mut err = ValidationError::new("password_strength");
        err.message = Some("Password must be at least 8 characters and contain letters and digits".into());
        Err(err)
    }
}

pub fn skill_list(skills: &[String]) -> Result<(), ValidationError> {
    if skills.len() > 50 {
        return Err(ValidationError::new("too_many_skills"));
    }
    if skills.iter().any(|s| s.trim().is_empty() || s.chars().count() > 60) {
        return Err(ValidationError::new("invalid_skill"));
    }
    Ok(())
}

/// Trims, lowercases and de-duplicates a skill list, keeping first-seen order.
pub fn normalize_skills(skills: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(skills.len());
    for skill in skills {
        let s = skill.trim().to_lowercase();
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }
    out
}
