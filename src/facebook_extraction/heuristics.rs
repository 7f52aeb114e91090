// src/facebook_extraction/heuristics.rs
//! Regex matchers that pull listing fields out of free-form post text.
//!
//! Every matcher is independent and returns `None` (or an empty list) when
//! nothing plausible is found. Dates are resolved against a reference date
//! so that "May 15" in a post written in March means this May, while
//! "Jan 5" written in April means next January.

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

use crate::types::{ExtractedFields, GenderPreference};

pub const MIN_PLAUSIBLE_RENT: i64 = 100;
pub const MAX_PLAUSIBLE_RENT: i64 = 10_000;

/// A yearless date more than this many days in the past belongs to next year
const YEAR_ROLLOVER_DAYS: i64 = 60;
const MAX_TITLE_CHARS: usize = 80;
const MAX_DESCRIPTION_CHARS: usize = 2000;

// =============================================================================
// Price
// =============================================================================

static DOLLAR_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$\s*(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(k\b)?\s*(/\s*mo(?:nth)?\b|/\s*m\b|per\s+mo(?:nth)?\b|a\s+month\b|each\s+month\b|monthly\b|pm\b|mo\b|month\b)?",
    )
    .unwrap()
});
static BARE_MONTHLY_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2},\d{3}|\d{3,4})\s*(?:/\s*mo(?:nth)?\b|per\s+month\b|a\s+month\b|monthly\b)")
        .unwrap()
});
static NOT_RENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:sublease\s+|sublet\s+|security\s+|application\s+|one[\s-]time\s+)?(?:fee|deposit|gift|incentive|off\b|credit|bonus|discount|reward|cash)",
    )
    .unwrap()
});

fn parse_amount(digits: &str, thousands: bool) -> Option<i64> {
    let value: f64 = digits.replace(',', "").parse().ok()?;
    let value = if thousands { value * 1000.0 } else { value };
    Some(value.round() as i64)
}

pub fn is_plausible_rent(amount: i64) -> bool {
    (MIN_PLAUSIBLE_RENT..=MAX_PLAUSIBLE_RENT).contains(&amount)
}

/// Monthly rent. Amounts tagged as monthly win over bare `$` amounts,
/// and fees or incentives are skipped.
pub fn extract_price(text: &str) -> Option<i64> {
    let mut untagged = None;

    for caps in DOLLAR_PRICE_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if NOT_RENT_RE.is_match(&text[whole.end()..]) {
            continue;
        }
        let Some(amount) = parse_amount(&caps[1], caps.get(2).is_some()) else {
            continue;
        };
        if !is_plausible_rent(amount) {
            continue;
        }
        if caps.get(3).is_some() {
            return Some(amount);
        }
        untagged.get_or_insert(amount);
    }

    if untagged.is_some() {
        return untagged;
    }

    BARE_MONTHLY_PRICE_RE
        .captures_iter(text)
        .filter_map(|caps| parse_amount(&caps[1], false))
        .find(|amount| is_plausible_rent(*amount))
}

// =============================================================================
// Dates
// =============================================================================

static NUMERIC_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?\b").unwrap()
});
static NOT_A_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:b\b|ba\b|bath|bed|bd\b|br\b|apt|apartment|unit|split)").unwrap()
});
static MONTH_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b\.?(?:\s+(\d{1,2})(?:st|nd|rd|th)?\b)?(?:,?\s*(\d{4})\b)?",
    )
    .unwrap()
});
static SEMESTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(spring|summer|fall|autumn)\b(?:\s+(?:semester|term|session))?(?:\s+'?(\d{4}|\d{2})\b)?")
        .unwrap()
});
static ACADEMIC_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(\d{4})\s*[-/–]\s*(?:\d{4}|\d{2})\s+)?\b(?:academic|school)\s+year\b")
        .unwrap()
});

static OPEN_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:until|till|til|through|thru|to)\s*$").unwrap()
});

const RANGE_CONNECTORS: &[&str] = &[
    "-", "–", "—", "to", "through", "thru", "until", "till", "til",
];

#[derive(Debug, Clone, Copy)]
struct DateToken {
    start: usize,
    end: usize,
    month: u32,
    day: Option<u32>,
    year: Option<i32>,
}

impl DateToken {
    /// A month name with neither day nor year, only trusted inside a range
    fn is_bare(&self) -> bool {
        self.day.is_none() && self.year.is_none()
    }
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)?.to_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn full_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    let year = if year < 100 { 2000 + year } else { year };
    (2000..=2100).contains(&year).then_some(year)
}

fn collect_date_tokens(text: &str) -> Vec<DateToken> {
    let mut tokens = Vec::new();

    for caps in NUMERIC_DATE_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if text[..whole.start()].ends_with('$') || NOT_A_DATE_RE.is_match(&text[whole.end()..]) {
            continue;
        }
        let (Ok(month), Ok(day)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            continue;
        }
        let year = match caps.get(3) {
            Some(raw) => match full_year(raw.as_str()) {
                Some(year) => Some(year),
                None => continue,
            },
            None => None,
        };
        tokens.push(DateToken {
            start: whole.start(),
            end: whole.end(),
            month,
            day: Some(day),
            year,
        });
    }

    for caps in MONTH_DATE_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(month) = month_number(&caps[1]) else { continue };
        let day = caps
            .get(2)
            .and_then(|d| d.as_str().parse::<u32>().ok())
            .filter(|d| (1..=31).contains(d));
        let year = caps.get(3).and_then(|y| full_year(y.as_str()));
        tokens.push(DateToken {
            start: whole.start(),
            end: whole.end(),
            month,
            day,
            year,
        });
    }

    tokens.sort_by_key(|t| t.start);
    let mut deduped: Vec<DateToken> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if deduped.last().is_some_and(|prev| token.start < prev.end) {
            continue;
        }
        deduped.push(token);
    }
    deduped
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Place a yearless month/day in the reference year, or the next one when it
/// would fall well before the reference date
fn infer_year(month: u32, day: u32, reference: NaiveDate) -> Option<NaiveDate> {
    let candidate = NaiveDate::from_ymd_opt(reference.year(), month, day)?;
    if candidate < reference - Duration::days(YEAR_ROLLOVER_DAYS) {
        NaiveDate::from_ymd_opt(reference.year() + 1, month, day)
    } else {
        Some(candidate)
    }
}

fn resolve_start(token: &DateToken, reference: NaiveDate) -> Option<NaiveDate> {
    let day = token.day.unwrap_or(1);
    match token.year {
        Some(year) => NaiveDate::from_ymd_opt(year, token.month, day),
        None => infer_year(token.month, day, reference),
    }
}

fn resolve_end(
    token: &DateToken,
    start: Option<NaiveDate>,
    reference: NaiveDate,
) -> Option<NaiveDate> {
    let date_in = |year: i32| match token.day {
        Some(day) => NaiveDate::from_ymd_opt(year, token.month, day),
        None => last_day_of_month(year, token.month),
    };

    if let Some(year) = token.year {
        return date_in(year);
    }

    match start {
        Some(start) => {
            let candidate = date_in(start.year())?;
            if candidate <= start {
                date_in(start.year() + 1)
            } else {
                Some(candidate)
            }
        }
        None => {
            let candidate = date_in(reference.year())?;
            if candidate < reference - Duration::days(YEAR_ROLLOVER_DAYS) {
                date_in(reference.year() + 1)
            } else {
                Some(candidate)
            }
        }
    }
}

/// "until 7/31": the date closes a window whose start is not given
fn closes_window(text: &str, token: &DateToken) -> bool {
    OPEN_END_RE.is_match(&text[..token.start])
}

fn find_range<'t>(text: &str, tokens: &'t [DateToken]) -> Option<(&'t DateToken, &'t DateToken)> {
    tokens.windows(2).find_map(|pair| {
        let between = text[pair[0].end..pair[1].start].trim().to_lowercase();
        RANGE_CONNECTORS
            .contains(&between.as_str())
            .then_some((&pair[0], &pair[1]))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Season {
    Spring,
    Summer,
    Fall,
}

fn semester_bounds(season: Season, year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let (start, end) = match season {
        Season::Spring => ((1, 1), (5, 15)),
        Season::Summer => ((5, 16), (8, 15)),
        Season::Fall => ((8, 16), (12, 31)),
    };
    Some((
        NaiveDate::from_ymd_opt(year, start.0, start.1)?,
        NaiveDate::from_ymd_opt(year, end.0, end.1)?,
    ))
}

/// Span of every semester named in the text, each one after the previous
fn semester_range(text: &str, reference: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let mut seen: Vec<Season> = Vec::new();
    let mut range: Option<(NaiveDate, NaiveDate)> = None;

    for caps in SEMESTER_RE.captures_iter(text) {
        let season = match caps[1].to_lowercase().as_str() {
            "spring" => Season::Spring,
            "summer" => Season::Summer,
            _ => Season::Fall,
        };
        if seen.contains(&season) {
            continue;
        }
        seen.push(season);

        let explicit_year = caps.get(2).and_then(|y| full_year(y.as_str()));
        let bounds = match (explicit_year, range) {
            (Some(year), _) => semester_bounds(season, year)?,
            (None, None) => {
                let this_year = semester_bounds(season, reference.year())?;
                if this_year.1 < reference {
                    semester_bounds(season, reference.year() + 1)?
                } else {
                    this_year
                }
            }
            (None, Some((_, previous_end))) => {
                let same_year = semester_bounds(season, previous_end.year())?;
                if same_year.0 <= previous_end {
                    semester_bounds(season, previous_end.year() + 1)?
                } else {
                    same_year
                }
            }
        };

        range = Some(match range {
            None => bounds,
            Some((start, end)) => (start.min(bounds.0), end.max(bounds.1)),
        });
    }

    range
}

fn academic_year_range(text: &str, reference: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let caps = ACADEMIC_YEAR_RE.captures(text)?;
    let start = match caps.get(1).and_then(|y| full_year(y.as_str())) {
        Some(year) => NaiveDate::from_ymd_opt(year, 8, 16)?,
        None => infer_year(8, 16, reference)?,
    };
    let end = NaiveDate::from_ymd_opt(start.year() + 1, 5, 15)?;
    Some((start, end))
}

/// Sublease window. Explicit ranges win, then a lone end date ("until 7/31"),
/// then lone explicit dates, then "academic year", then semester names.
pub fn extract_dates(text: &str, reference: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let tokens = collect_date_tokens(text);
    let season = academic_year_range(text, reference).or_else(|| semester_range(text, reference));

    if let Some((first, second)) = find_range(text, &tokens) {
        let start = resolve_start(first, reference);
        let end = resolve_end(second, start, reference);
        if start.is_some() || end.is_some() {
            return (start, end);
        }
    }

    if let Some(lead) = tokens
        .iter()
        .find(|t| !t.is_bare() || closes_window(text, t))
        .filter(|t| closes_window(text, t))
    {
        return (None, resolve_end(lead, None, reference));
    }

    let explicit: Vec<&DateToken> = tokens.iter().filter(|t| !t.is_bare()).collect();
    if let Some(first) = explicit.first() {
        let start = resolve_start(first, reference);
        let end = explicit
            .get(1)
            .and_then(|token| resolve_end(token, start, reference))
            .or_else(|| {
                // "available Aug 20 for fall" ends with the semester
                let (_, season_end) = season?;
                start.filter(|s| *s < season_end).map(|_| season_end)
            });
        return (start, end);
    }

    match season {
        Some((start, end)) => (Some(start), Some(end)),
        None => (None, None),
    }
}

/// Parse a single date as written by a person or a model: ISO first,
/// then the same forms the post matcher understands. `after` marks an
/// end date, which rolls past the start and defaults to month end.
pub fn parse_date_text(
    value: &str,
    reference: NaiveDate,
    after: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    let token = collect_date_tokens(value).into_iter().next()?;
    match after {
        Some(start) => resolve_end(&token, Some(start), reference),
        None => resolve_start(&token, reference),
    }
}

// =============================================================================
// Bedrooms and bathrooms
// =============================================================================

static ROOM_IN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:bed)?room\s+in\s+(?:an?\s+|my\s+|our\s+|the\s+)?(\d{1,2}|one|two|three|four|five|six)[\s-]*(?:bedrooms?\b|beds?\b|br\b|bd\b|b\d|b/|b\b)",
    )
    .unwrap()
});
static BED_BATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})\s*(?:bedrooms?|beds?|br|bd|b)\s*[/x,&-]?\s*(\d(?:\.5)?)\s*(?:bathrooms?|baths?|ba|b)\b",
    )
    .unwrap()
});
static BEDROOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})[\s-]*(?:bedrooms?|beds?|br|bd)\b").unwrap()
});
static WORD_BEDROOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(one|two|three|four|five|six)[\s-]*(?:bedrooms?|beds?|br|bd)\b").unwrap()
});
static STUDIO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bstudio\b").unwrap());
static BATHROOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}(?:\.5)?)\s*(?:bathrooms?|baths?|ba)\b").unwrap()
});
static WORD_BATHROOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(one|two|three|four)[\s-]*(?:bathrooms?|baths?)\b").unwrap()
});
static PRIVATE_BATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:private|own)\s+bath(?:room)?\b").unwrap()
});

const MAX_ROOMS: i64 = 12;

fn count_from(raw: &str) -> Option<i64> {
    let count = match raw.to_lowercase().as_str() {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        digits => digits.parse().ok()?,
    };
    (0..=MAX_ROOMS).contains(&count).then_some(count)
}

/// Bedrooms in the unit. "Room in a 4 bedroom" counts the whole unit.
pub fn extract_bedrooms(text: &str) -> Option<i64> {
    [&*ROOM_IN_RE, &*BED_BATH_RE, &*BEDROOM_RE, &*WORD_BEDROOM_RE]
        .into_iter()
        .find_map(|re| re.captures(text).and_then(|caps| count_from(&caps[1])))
        .or_else(|| STUDIO_RE.is_match(text).then_some(0))
}

pub fn extract_bathrooms(text: &str) -> Option<f64> {
    let numeric = |raw: &str| {
        raw.parse::<f64>()
            .ok()
            .filter(|b| (0.5..=MAX_ROOMS as f64).contains(b))
    };

    if let Some(baths) = BED_BATH_RE.captures(text).and_then(|caps| numeric(&caps[2])) {
        return Some(baths);
    }
    if let Some(baths) = BATHROOM_RE.captures(text).and_then(|caps| numeric(&caps[1])) {
        return Some(baths);
    }
    if let Some(baths) = WORD_BATHROOM_RE
        .captures(text)
        .and_then(|caps| count_from(&caps[1]))
    {
        return Some(baths as f64);
    }
    PRIVATE_BATH_RE.is_match(text).then_some(1.0)
}

// =============================================================================
// Amenities, requirements and flags
// =============================================================================

static NEGATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bno|\bnot|\bwithout|n't)\s+(?:\w+\s+){0,2}$").unwrap()
});
static UNFURNISHED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bunfurnished\b|\bnot\s+furnished\b|\b(?:no|without)\s+furniture\b").unwrap()
});
static FURNISHED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfurnished\b|\bfurniture\s+included\b|\bcomes\s+with\s+furniture\b").unwrap()
});
static UTILITIES_EXCLUDED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:utilities|utils)\s+(?:are\s+)?not\s+included\b|(?:\bplus|\+)\s*(?:utilities|utils|electric)\b|\butilities\s+(?:extra|separate|excluded)\b|\bexcluding\s+utilities\b",
    )
    .unwrap()
});
static UTILITIES_INCLUDED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:utilities|utils)\s+(?:are\s+)?(?:included|incl\b)|\ball\s+utilities\b|\butilities\s+covered\b|\bincludes?\s+(?:all\s+)?utilities\b",
    )
    .unwrap()
});
static FEMALE_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:female|girls?|women|woman)(?:\s+|-)?(?:only|preferred|subleaser|roommates?|tenants?)\b|\blooking\s+for\s+(?:an?\s+)?(?:female|girl)\b|\ball[\s-]+(?:female|girls?)\b",
    )
    .unwrap()
});
static MALE_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:male|guys?|men|man|boys?)(?:\s+|-)?(?:only|preferred|subleaser|roommates?|tenants?)\b|\blooking\s+for\s+(?:an?\s+)?(?:male|guy)\b|\ball[\s-]+(?:male|guys?)\b",
    )
    .unwrap()
});

struct KeywordRule {
    name: &'static str,
    pattern: &'static str,
}

const AMENITY_RULES: &[KeywordRule] = &[
    KeywordRule {
        name: "Gym",
        pattern: r"\bgym\b|\bfitness\s+(?:center|centre|room)\b|\bworkout\s+room\b",
    },
    KeywordRule {
        name: "Pool",
        pattern: r"\b(?:swimming\s+)?pool\b",
    },
    KeywordRule {
        name: "Parking",
        pattern: r"\bparking\b|\bgarage\b",
    },
    KeywordRule {
        name: "In-unit laundry",
        pattern: r"\bin[\s-]unit\s+(?:laundry|washer)\b|\bwasher\s*(?:/|and|&)\s*dryer\b|\bw/d\b|\blaundry\s+in\s+(?:the\s+)?unit\b",
    },
    KeywordRule {
        name: "Dishwasher",
        pattern: r"\bdishwasher\b",
    },
    KeywordRule {
        name: "Air conditioning",
        pattern: r"\ba/c\b|\bair\s+conditioning\b|\bcentral\s+air\b|\bac\b",
    },
    KeywordRule {
        name: "Balcony",
        pattern: r"\bbalcony\b|\bpatio\b",
    },
    KeywordRule {
        name: "Pet friendly",
        pattern: r"\bpet[\s-]friendly\b|\bpets\s+(?:are\s+)?(?:allowed|welcome|ok)\b|\b(?:dogs?|cats?)\s+allowed\b",
    },
    KeywordRule {
        name: "WiFi",
        pattern: r"\bwi[\s-]?fi\b|\binternet\b",
    },
    KeywordRule {
        name: "Private bathroom",
        pattern: r"\b(?:private|own)\s+bath(?:room)?\b",
    },
    KeywordRule {
        name: "Near campus",
        pattern: r"\b(?:close|near|next)\s+(?:to\s+)?campus\b|\bwalk(?:ing)?\s+distance\b|\bminutes?\s+(?:walk\s+)?(?:from|to)\s+campus\b",
    },
    KeywordRule {
        name: "Bus route",
        pattern: r"\bbus\s+(?:stop|route|line)\b|\bcata\b",
    },
    KeywordRule {
        name: "Study room",
        pattern: r"\bstudy\s+(?:room|lounge)s?\b",
    },
    KeywordRule {
        name: "Rooftop",
        pattern: r"\brooftop\b",
    },
];

const REQUIREMENT_RULES: &[KeywordRule] = &[
    KeywordRule {
        name: "No pets",
        pattern: r"\bno\s+(?:pets?|animals)\b|\bpets?\s+(?:are\s+)?not\s+allowed\b",
    },
    KeywordRule {
        name: "No smoking",
        pattern: r"\bno\s+smok(?:ing|ers?)\b|\bnon[\s-]?smok(?:ing|ers?)\b|\bsmoke[\s-]free\b",
    },
    KeywordRule {
        name: "Students only",
        pattern: r"\b(?:psu\s+)?students?\s+only\b|\bmust\s+be\s+an?\s+(?:psu\s+|penn\s+state\s+)?student\b",
    },
    KeywordRule {
        name: "Graduate students preferred",
        pattern: r"\bgrad(?:uate)?\s+students?\b",
    },
    KeywordRule {
        name: "Sublease fee",
        pattern: r"\bsub(?:lease|let)\s+fee\b|\btransfer\s+fee\b",
    },
    KeywordRule {
        name: "Incentive offered",
        pattern: r"\bincentive\b|\bfirst\s+month(?:'s)?\s+(?:rent\s+)?(?:free|covered|paid)\b|\bwill\s+(?:pay|cover)\b|\bgift\s+card\b",
    },
];

fn compile_rules(rules: &[KeywordRule]) -> Vec<(&'static str, Regex)> {
    rules
        .iter()
        .map(|rule| (rule.name, Regex::new(&format!("(?i){}", rule.pattern)).unwrap()))
        .collect()
}

static AMENITY_MATCHERS: LazyLock<Vec<(&'static str, Regex)>> =
    LazyLock::new(|| compile_rules(AMENITY_RULES));
static REQUIREMENT_MATCHERS: LazyLock<Vec<(&'static str, Regex)>> =
    LazyLock::new(|| compile_rules(REQUIREMENT_RULES));

/// Whether a negation word sits within two words before `start`
fn is_negated(text: &str, start: usize) -> bool {
    let before = &text[..start];
    let window_start = before
        .char_indices()
        .rev()
        .nth(24)
        .map(|(i, _)| i)
        .unwrap_or(0);
    NEGATION_RE.is_match(&before[window_start..])
}

fn has_affirmed_match(re: &Regex, text: &str) -> bool {
    re.find_iter(text).any(|m| !is_negated(text, m.start()))
}

/// `Some(false)` for explicit "unfurnished" wording, `Some(true)` for furnished
pub fn extract_furnished(text: &str) -> Option<bool> {
    if UNFURNISHED_RE.is_match(text) {
        return Some(false);
    }
    has_affirmed_match(&FURNISHED_RE, text).then_some(true)
}

pub fn extract_utilities_included(text: &str) -> Option<bool> {
    if UTILITIES_EXCLUDED_RE.is_match(text) {
        return Some(false);
    }
    UTILITIES_INCLUDED_RE.is_match(text).then_some(true)
}

/// Canonical amenity names, furnished first
pub fn extract_amenities(text: &str) -> Vec<String> {
    let mut amenities = Vec::new();
    if extract_furnished(text) == Some(true) {
        amenities.push("Furnished".to_string());
    }
    for (name, re) in AMENITY_MATCHERS.iter() {
        if has_affirmed_match(re, text) {
            amenities.push(name.to_string());
        }
    }
    amenities
}

pub fn extract_gender_preference(text: &str) -> Option<GenderPreference> {
    match (FEMALE_ONLY_RE.is_match(text), MALE_ONLY_RE.is_match(text)) {
        (true, false) => Some(GenderPreference::Female),
        (false, true) => Some(GenderPreference::Male),
        _ => None,
    }
}

pub fn extract_special_requirements(text: &str) -> Vec<String> {
    let mut requirements = Vec::new();
    match extract_gender_preference(text) {
        Some(GenderPreference::Female) => requirements.push("Female only".to_string()),
        Some(GenderPreference::Male) => requirements.push("Male only".to_string()),
        _ => {}
    }
    for (name, re) in REQUIREMENT_MATCHERS.iter() {
        if re.is_match(text) {
            requirements.push(name.to_string());
        }
    }
    requirements
}

// =============================================================================
// Contact, place and text fields
// =============================================================================

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?\b\d{3}\)?[-.\s]?\d{3}[-.\s]\d{4}\b").unwrap()
});
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d{1,5}\s+(?:[NSEW]\.?\s+)?(?:[A-Z][A-Za-z]+\s+){1,3}(?:St|Street|Ave|Avenue|Blvd|Boulevard|Way|Rd|Road|Dr|Drive|Ln|Lane|Ct|Court|Pl|Place|Pike|Alley)\b\.?",
    )
    .unwrap()
});

/// Apartment complexes around the University Park campus
const KNOWN_PROPERTIES: &[&str] = &[
    "The Rise",
    "The Legacy",
    "The Metropolitan",
    "The Yards",
    "The Retreat",
    "The Heights",
    "The Lodges",
    "The Edge",
    "The Station",
    "Here State College",
    "Beaver Hill",
    "Calder Commons",
    "Park Crest Terrace",
    "Nittany Garden",
    "Nittany Crossing",
    "Penn Tower",
    "Pugh Centre",
    "Meridian on College",
    "Lions Crossing",
    "University Terrace",
    "Blue Course Commons",
    "Graduate State College",
];

static PROPERTY_MATCHERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    KNOWN_PROPERTIES
        .iter()
        .map(|name| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(name));
            (*name, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// First email address, else first phone number
pub fn extract_contact(text: &str) -> Option<String> {
    EMAIL_RE
        .find(text)
        .or_else(|| PHONE_RE.find(text))
        .map(|m| m.as_str().trim().to_string())
}

pub fn extract_property_name(text: &str) -> Option<String> {
    PROPERTY_MATCHERS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(name, _)| name.to_string())
}

pub fn extract_address(text: &str) -> Option<String> {
    ADDRESS_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

/// Short headline from the structured fields, else the first line of the post
pub fn build_title(fields: &ExtractedFields, text: &str) -> Option<String> {
    let rooms = fields.bedrooms.map(|b| match b {
        0 => "Studio".to_string(),
        n => format!("{}BR", n),
    });

    match (rooms, fields.property_name.as_deref()) {
        (Some(rooms), Some(property)) => Some(format!("{} sublease at {}", rooms, property)),
        (None, Some(property)) => Some(format!("Sublease at {}", property)),
        (Some(rooms), None) => Some(format!("{} sublease", rooms)),
        (None, None) => text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| truncate_chars(line, MAX_TITLE_CHARS)),
    }
}

pub fn extract_description(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| truncate_chars(text, MAX_DESCRIPTION_CHARS))
}

/// Run every matcher over the text
pub fn extract_all(text: &str, reference: NaiveDate) -> ExtractedFields {
    let (start_date, end_date) = extract_dates(text, reference);

    let mut fields = ExtractedFields {
        title: None,
        monthly_rent: extract_price(text),
        start_date,
        end_date,
        bedrooms: extract_bedrooms(text),
        bathrooms: extract_bathrooms(text),
        property_name: extract_property_name(text),
        address: extract_address(text),
        amenities: extract_amenities(text),
        special_requirements: extract_special_requirements(text),
        gender_preference: extract_gender_preference(text),
        furnished: extract_furnished(text),
        utilities_included: extract_utilities_included(text),
        contact: extract_contact(text),
        description: extract_description(text),
    };
    fields.title = build_title(&fields, text);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn march() -> NaiveDate {
        date(2025, 3, 1)
    }

    #[test]
    fn test_price_prefers_monthly_amounts() {
        assert_eq!(extract_price("Subleasing for $650/month, utilities included"), Some(650));
        assert_eq!(
            extract_price("$200 sublease fee, rent is $1,150 per month"),
            Some(1150)
        );
        assert_eq!(extract_price("Only $1.2k a month!"), Some(1200));
        assert_eq!(extract_price("Asking 800/mo obo"), Some(800));
    }

    #[test]
    fn test_price_skips_fees_and_implausible_amounts() {
        assert_eq!(extract_price("$300 incentive! Rent $725"), Some(725));
        assert_eq!(extract_price("$45 for a parking pass"), None);
        assert_eq!(extract_price("$25000 total"), None);
        assert_eq!(extract_price("no price listed"), None);
    }

    #[test]
    fn test_explicit_date_range() {
        assert_eq!(
            extract_dates("Available May 15 - August 10", march()),
            (Some(date(2025, 5, 15)), Some(date(2025, 8, 10)))
        );
        assert_eq!(
            extract_dates("Sublease from 8/15 to 5/10", march()),
            (Some(date(2025, 8, 15)), Some(date(2026, 5, 10)))
        );
        assert_eq!(
            extract_dates("Lease runs 1/1/2026 through 5/15/2026", march()),
            (Some(date(2026, 1, 1)), Some(date(2026, 5, 15)))
        );
    }

    #[test]
    fn test_yearless_dates_roll_forward() {
        // Jan 5 is more than 60 days before April 1
        assert_eq!(
            extract_dates("Jan 5 - May 10", date(2025, 4, 1)),
            (Some(date(2026, 1, 5)), Some(date(2026, 5, 10)))
        );
        // Within the grace window it stays in the current year
        assert_eq!(
            extract_dates("Available Feb 15 until May 1", march()),
            (Some(date(2025, 2, 15)), Some(date(2025, 5, 1)))
        );
    }

    #[test]
    fn test_month_only_range() {
        assert_eq!(
            extract_dates("June - August 2025", march()),
            (Some(date(2025, 6, 1)), Some(date(2025, 8, 31)))
        );
    }

    #[test]
    fn test_semesters() {
        assert_eq!(
            extract_dates("Summer sublease near campus", march()),
            (Some(date(2025, 5, 16)), Some(date(2025, 8, 15)))
        );
        assert_eq!(
            extract_dates("Taking over my lease for fall and spring", march()),
            (Some(date(2025, 8, 16)), Some(date(2026, 5, 15)))
        );
        assert_eq!(
            extract_dates("Spring 2026 semester", march()),
            (Some(date(2026, 1, 1)), Some(date(2026, 5, 15)))
        );
        // Spring of the reference year is already over in June
        assert_eq!(
            extract_dates("spring sublease", date(2025, 6, 1)),
            (Some(date(2026, 1, 1)), Some(date(2026, 5, 15)))
        );
    }

    #[test]
    fn test_academic_year() {
        assert_eq!(
            extract_dates("Looking for someone for the school year", march()),
            (Some(date(2025, 8, 16)), Some(date(2026, 5, 15)))
        );
        assert_eq!(
            extract_dates("2026-2027 academic year lease", march()),
            (Some(date(2026, 8, 16)), Some(date(2027, 5, 15)))
        );
    }

    #[test]
    fn test_single_date_ends_with_semester() {
        assert_eq!(
            extract_dates("Available Aug 20 for the fall semester", march()),
            (Some(date(2025, 8, 20)), Some(date(2025, 12, 31)))
        );
    }

    #[test]
    fn test_lone_end_date_leaves_start_open() {
        assert_eq!(
            extract_dates("Lease available now until 7/31, $700/mo", march()),
            (None, Some(date(2025, 7, 31)))
        );
        assert_eq!(
            extract_dates("Available through July", march()),
            (None, Some(date(2025, 7, 31)))
        );
        // A move-in date is still a start
        assert_eq!(
            extract_dates("Move in by 8/15", march()),
            (Some(date(2025, 8, 15)), None)
        );
    }

    #[test]
    fn test_bed_bath_notations_are_not_dates() {
        assert_eq!(extract_dates("2/2 apartment, 1/2 bath", march()), (None, None));
    }

    #[test]
    fn test_parse_date_text() {
        assert_eq!(parse_date_text("2025-09-01", march(), None), Some(date(2025, 9, 1)));
        assert_eq!(parse_date_text("May 20", march(), None), Some(date(2025, 5, 20)));
        assert_eq!(
            parse_date_text("May", march(), Some(date(2025, 8, 16))),
            Some(date(2026, 5, 31))
        );
        assert_eq!(parse_date_text("ASAP", march(), None), None);
    }

    #[test]
    fn test_bedrooms() {
        assert_eq!(extract_bedrooms("4b4b at The Rise"), Some(4));
        assert_eq!(extract_bedrooms("Room in a 4 bedroom apartment"), Some(4));
        assert_eq!(extract_bedrooms("1 bedroom in a 3 bedroom unit"), Some(3));
        assert_eq!(extract_bedrooms("2br/1.5ba"), Some(2));
        assert_eq!(extract_bedrooms("cozy two bedroom"), Some(2));
        assert_eq!(extract_bedrooms("Studio apartment downtown"), Some(0));
        assert_eq!(extract_bedrooms("great location"), None);
    }

    #[test]
    fn test_bathrooms() {
        assert_eq!(extract_bathrooms("4b4b"), Some(4.0));
        assert_eq!(extract_bathrooms("2br/1.5ba"), Some(1.5));
        assert_eq!(extract_bathrooms("2 bed 2 bath"), Some(2.0));
        assert_eq!(extract_bathrooms("3 bedroom, 1.5 bathrooms"), Some(1.5));
        assert_eq!(extract_bathrooms("Room with private bathroom"), Some(1.0));
        assert_eq!(extract_bathrooms("shared kitchen"), None);
    }

    #[test]
    fn test_amenities_and_requirements() {
        let text = "Fully furnished, in-unit washer/dryer, gym and pool. No pets allowed. \
                    Utilities not included. Female only, no smoking please.";
        let amenities = extract_amenities(text);
        for expected in ["Furnished", "In-unit laundry", "Gym", "Pool"] {
            assert!(amenities.contains(&expected.to_string()), "missing {}", expected);
        }
        assert!(!amenities.contains(&"Pet friendly".to_string()));
        assert_eq!(extract_utilities_included(text), Some(false));
        assert_eq!(extract_gender_preference(text), Some(GenderPreference::Female));

        let requirements = extract_special_requirements(text);
        assert_eq!(requirements[0], "Female only");
        assert!(requirements.contains(&"No pets".to_string()));
        assert!(requirements.contains(&"No smoking".to_string()));
    }

    #[test]
    fn test_negated_amenities() {
        let text = "Unfurnished apartment, no parking, utilities included";
        assert_eq!(extract_furnished(text), Some(false));
        let amenities = extract_amenities(text);
        assert!(!amenities.contains(&"Parking".to_string()));
        assert!(!amenities.contains(&"Furnished".to_string()));
        assert_eq!(extract_utilities_included(text), Some(true));
        assert_eq!(extract_furnished("nice view"), None);
    }

    #[test]
    fn test_contact_property_and_address() {
        assert_eq!(
            extract_contact("DM me or email jdoe123@psu.edu"),
            Some("jdoe123@psu.edu".to_string())
        );
        assert_eq!(
            extract_contact("Text (814) 555-0100"),
            Some("(814) 555-0100".to_string())
        );
        assert_eq!(
            extract_property_name("subleasing at the rise this summer"),
            Some("The Rise".to_string())
        );
        assert_eq!(
            extract_address("Located at 478 E Calder Way, State College"),
            Some("478 E Calder Way".to_string())
        );
    }

    #[test]
    fn test_extract_all_builds_title() {
        let text = "Summer sublease at The Legacy!\n2b2b, $700/month, furnished";
        let fields = extract_all(text, march());
        assert_eq!(fields.monthly_rent, Some(700));
        assert_eq!(fields.bedrooms, Some(2));
        assert_eq!(fields.bathrooms, Some(2.0));
        assert_eq!(fields.property_name.as_deref(), Some("The Legacy"));
        assert_eq!(fields.title.as_deref(), Some("2BR sublease at The Legacy"));
        assert_eq!(fields.start_date, Some(date(2025, 5, 16)));
        assert_eq!(fields.furnished, Some(true));

        let bare = extract_all("Anyone need a place?", march());
        assert_eq!(bare.title.as_deref(), Some("Anyone need a place?"));
        assert!(bare.monthly_rent.is_none());
    }
}
