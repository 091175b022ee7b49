#![allow(missing_docs)]

//! Newtypes for the cost dimensions used by the weighted evaluator.

macro_rules! unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            derive_more::Add,
            derive_more::Sub,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(pub f64);

        impl $name {
            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = $name>>(iter: I) -> Self {
                iter.fold(Self(0.0), |acc, x| acc + x)
            }
        }
    };
}

// The three cost dimensions tracked per resource
unit_struct!(EnergyCost);
unit_struct!(UseCost);
unit_struct!(Co2Footprint);

// The normalised weighted sum over the three dimensions. Lower is better.
unit_struct!(Score);
