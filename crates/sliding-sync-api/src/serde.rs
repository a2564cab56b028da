//! De-/serialization helpers.

pub(crate) mod duration {
    //! De-/serialization functions for `std::time::Duration` objects
    //! represented as milliseconds.

    pub(crate) mod opt_ms {
        //! De-/serialization functions for `Option<std::time::Duration>`
        //! objects represented as milliseconds.
        //!
        //! Delegates to `js_int::UInt` to ensure the integer is within the
        //! range that can be unambiguously represented by an f64.

        use std::time::Duration;

        use js_int::UInt;
        use serde::{
            de::{Deserialize, Deserializer},
            ser::{Error, Serialize, Serializer},
        };

        /// Serializes an `Option<Duration>` to an integer representing
        /// milliseconds.
        ///
        /// Fails if the number of milliseconds is greater than the maximum
        /// integer that can be unambiguously represented by an f64.
        pub(crate) fn serialize<S>(
            opt_duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match opt_duration {
                Some(duration) => match UInt::try_from(duration.as_millis()) {
                    Ok(uint) => uint.serialize(serializer),
                    Err(err) => Err(S::Error::custom(err)),
                },
                None => serializer.serialize_none(),
            }
        }

        /// Deserializes an `Option<Duration>` from an integer representing
        /// milliseconds.
        pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Ok(Option::<UInt>::deserialize(deserializer)?
                .map(|millis| Duration::from_millis(millis.into())))
        }

    }
}
