//! Nostalgia scoring
//!
//! Pure functions combining personal nostalgia (a Gaussian "reminiscence
//! bump" around the age the user was when the content came out) with a
//! cultural term for pre-birth content. Popularity boosts nostalgia but
//! cannot create it.

/// Default peak of the reminiscence bump, in years of age
pub const PEAK_AGE: f64 = 13.0;
/// Default Gaussian width of the bump
pub const PEAK_WIDTH: f64 = 8.0;
/// Default decay rate applied to content released before the user's birth
pub const PREBIRTH_DECAY: f64 = 0.03;

/// Age-based nostalgia in `[0, 1]`
///
/// Post-birth ages score on a Gaussian centered at `peak_age`; negative
/// ages (content older than the user) decay exponentially from the value
/// at age zero.
pub fn age_nostalgia(age_at_release: f64, peak_age: f64, width: f64, prebirth_decay: f64) -> f64 {
    if age_at_release >= 0.0 {
        (-(age_at_release - peak_age).powi(2) / (2.0 * width * width)).exp()
    } else {
        let birth_score = (-(0.0 - peak_age).powi(2) / (2.0 * width * width)).exp();
        birth_score * (-prebirth_decay * age_at_release.abs()).exp()
    }
}

/// `age_nostalgia` with the default bump parameters
pub fn age_nostalgia_default(age_at_release: f64) -> f64 {
    age_nostalgia(age_at_release, PEAK_AGE, PEAK_WIDTH, PREBIRTH_DECAY)
}

/// Log-scaled popularity in `[0, 1]`
///
/// `log1p` scaling keeps mega-hits from dominating. Zero when either count
/// is non-positive.
pub fn popularity_score(rating_count: f64, max_count: f64) -> f64 {
    if rating_count <= 0.0 || max_count <= 0.0 {
        return 0.0;
    }
    rating_count.ln_1p() / max_count.ln_1p()
}

/// Combined nostalgia score in `[0, 1]`, rounded to 3 decimals
///
/// `personal * (0.7 + 0.3 * pop) + cultural`, where `cultural` only applies
/// to pre-birth content. `use_linear` swaps the log scaling for `value/max`
/// (for pre-normalized inputs like a 0-100 popularity index). When the user
/// declared an explicit nostalgic period, the Gaussian is centered on that
/// period instead of the reminiscence bump and the cultural term is dropped.
pub fn nostalgia_score(
    birth_year: i32,
    release_year: i32,
    rating_count: f64,
    max_count: f64,
    use_linear: bool,
    target_period: Option<(i32, i32)>,
) -> f64 {
    let pop = if use_linear {
        if max_count > 0.0 {
            (rating_count / max_count).min(1.0)
        } else {
            0.0
        }
    } else {
        popularity_score(rating_count, max_count)
    };

    let (personal, cultural) = match target_period {
        Some((start, end)) => {
            let mid = f64::from(start + end) / 2.0;
            let dist = (f64::from(release_year) - mid).abs();
            let width = (f64::from(end - start) / 2.0).max(5.0);
            let personal = (-(dist * dist) / (2.0 * width * width)).exp();
            (personal, 0.0)
        }
        None => {
            let age_at_release = f64::from(release_year - birth_year);
            let personal = age_nostalgia_default(age_at_release);
            let cultural = if age_at_release < 0.0 { pop * 0.4 } else { 0.0 };
            (personal, cultural)
        }
    };

    let final_score = personal * (0.7 + 0.3 * pop) + cultural;
    (final_score.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_age_scores_one() {
        assert_eq!(age_nostalgia_default(13.0), 1.0);
    }

    #[test]
    fn test_age_zero_score() {
        // exp(-169/128) with the default bump
        let score = age_nostalgia_default(0.0);
        assert!((score - 0.267).abs() < 0.001, "got {}", score);
    }

    #[test]
    fn test_prebirth_decays_from_birth_score() {
        let at_birth = age_nostalgia_default(0.0);
        let before = age_nostalgia_default(-10.0);
        let way_before = age_nostalgia_default(-50.0);
        assert!(before < at_birth);
        assert!(way_before < before);
        assert!((before - at_birth * (-0.3f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_popularity_score_bounds() {
        assert_eq!(popularity_score(0.0, 1000.0), 0.0);
        assert_eq!(popularity_score(100.0, 0.0), 0.0);
        assert_eq!(popularity_score(-5.0, 1000.0), 0.0);
        assert_eq!(popularity_score(1000.0, 1000.0), 1.0);
        let mid = popularity_score(10.0, 1000.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_nostalgia_at_reminiscence_peak_without_popularity() {
        // Born 2000, released 2013: age 13 is the peak. No ratings, so the
        // popularity boost and the cultural term are both zero.
        let score = nostalgia_score(2000, 2013, 0.0, 1000.0, false, None);
        assert!((score - 0.7).abs() < 0.001, "got {}", score);
    }

    #[test]
    fn test_popularity_boosts_but_does_not_create() {
        let obscure = nostalgia_score(2000, 2013, 0.0, 100_000.0, false, None);
        let popular = nostalgia_score(2000, 2013, 100_000.0, 100_000.0, false, None);
        assert!(popular > obscure);
        assert_eq!(popular, 1.0);

        // Far outside the bump, popularity alone cannot manufacture much.
        let recent_hit = nostalgia_score(2000, 2045, 100_000.0, 100_000.0, false, None);
        assert!(recent_hit < 0.01);
    }

    #[test]
    fn test_prebirth_content_gets_cultural_term() {
        // Released well before birth: personal decays, cultural = pop * 0.4.
        let score = nostalgia_score(2000, 1970, 100_000.0, 100_000.0, false, None);
        let personal = age_nostalgia_default(-30.0);
        let expected = personal * (0.7 + 0.3) + 0.4;
        assert!((score - (expected * 1000.0).round() / 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_target_period_centers_gaussian() {
        // Period 1990-2000: 1995 is the center and scores as pure personal.
        let center = nostalgia_score(2000, 1995, 0.0, 1000.0, false, Some((1990, 2000)));
        assert!((center - 0.7).abs() < 0.001, "got {}", center);

        let edge = nostalgia_score(2000, 2005, 0.0, 1000.0, false, Some((1990, 2000)));
        assert!(edge < center);
    }

    #[test]
    fn test_target_period_minimum_width() {
        // Degenerate one-year period still uses sigma >= 5.
        let score = nostalgia_score(2000, 1998, 0.0, 1000.0, false, Some((1995, 1995)));
        let expected = (-(9.0_f64) / (2.0 * 25.0)).exp() * 0.7;
        assert!((score - (expected * 1000.0).round() / 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_popularity_scaling() {
        // Spotify-style 0-100 popularity index.
        let log_scaled = nostalgia_score(2000, 2013, 50.0, 100.0, false, None);
        let linear = nostalgia_score(2000, 2013, 50.0, 100.0, true, None);
        // log1p(50)/log1p(100) ~ 0.85 > 0.5
        assert!(log_scaled > linear);
        assert!((linear - 0.85).abs() < 0.001, "got {}", linear);
    }

    #[test]
    fn test_score_is_clamped_and_rounded() {
        let score = nostalgia_score(2000, 1985, 1_000_000.0, 1_000_000.0, false, None);
        assert!((0.0..=1.0).contains(&score));
        // Three decimals only.
        assert_eq!(score, (score * 1000.0).round() / 1000.0);
    }
}
