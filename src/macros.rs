// Macros to simplify strategy declarations

/// Builds a [`Sequence`](crate::rewriting::strategy::Sequence) from anything
/// convertible into a strategy.
#[macro_export]
macro_rules! sequence {
    ($($strategy:expr),* $(,)?) => {
        $crate::rewriting::strategy::sequence(vec![
            $($crate::rewriting::strategy::IntoStrategy::into_strategy($strategy)),*
        ])
    };
}

/// Builds a [`FirstMatch`](crate::rewriting::strategy::FirstMatch) from
/// anything convertible into a strategy.
#[macro_export]
macro_rules! first_match {
    ($($strategy:expr),* $(,)?) => {
        $crate::rewriting::strategy::first_match(vec![
            $($crate::rewriting::strategy::IntoStrategy::into_strategy($strategy)),*
        ])
    };
}
