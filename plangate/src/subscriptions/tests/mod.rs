mod proptest_entitlements;
