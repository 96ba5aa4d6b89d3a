use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use time::{Date, OffsetDateTime};

pub const RIFFLE_ROUNDS: usize = 19;

/// Card-riffle shuffle. Each round deals the odd positions ahead of the even ones, then
/// mixes the deck once more with `rng`.
pub fn riffle_shuffle<T, R: Rng + ?Sized>(items: &mut Vec<T>, rng: &mut R) {
    for _ in 0..RIFFLE_ROUNDS {
        let mut odd = Vec::with_capacity(items.len() / 2);
        let mut even = Vec::with_capacity(items.len() - items.len() / 2);
        for (index, item) in items.drain(..).enumerate() {
            if index % 2 == 1 {
                odd.push(item);
            } else {
                even.push(item);
            }
        }
        items.append(&mut odd);
        items.append(&mut even);
        items.shuffle(rng);
    }
}

/// Generator seeded from today's date, so a day's shuffles repeat across restarts.
pub fn daily_rng() -> StdRng {
    StdRng::seed_from_u64(daily_seed(OffsetDateTime::now_utc().date()))
}

pub fn daily_seed(date: Date) -> u64 {
    u64::from(u8::from(date.month())) * 100 + u64::from(date.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    #[test]
    fn shuffle_keeps_every_item_once() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [0usize, 1, 2, 3, 10, 101] {
            let mut deck: Vec<usize> = (0..len).collect();
            riffle_shuffle(&mut deck, &mut rng);
            let mut sorted = deck.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..len).collect::<Vec<_>>());
        }
    }

    #[test]
    fn same_seed_same_order() {
        let mut a: Vec<u32> = (0..40).collect();
        let mut b = a.clone();
        riffle_shuffle(&mut a, &mut StdRng::seed_from_u64(1225));
        riffle_shuffle(&mut b, &mut StdRng::seed_from_u64(1225));
        assert_eq!(a, b);
    }

    #[test]
    fn seed_is_month_and_day() {
        let date = Date::from_calendar_date(2024, Month::March, 7).unwrap();
        assert_eq!(daily_seed(date), 307);
        let date = Date::from_calendar_date(1999, Month::December, 31).unwrap();
        assert_eq!(daily_seed(date), 1231);
    }
}
